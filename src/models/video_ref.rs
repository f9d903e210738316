//! The persisted pointer from a video record to its stored object.
//!
//! Presigned URLs expire, so the record keeps the bucket and key instead and
//! a URL is minted on every read. The two values share one column as
//! `<bucket>,<key>`. Buckets and keys containing a comma cannot be encoded;
//! object keys are generated by the service and never contain one, and the
//! bucket name is rejected at startup if it does.

use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed video reference `{0}`")]
pub struct VideoRefError(pub String);

impl VideoRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// The value written to `videos.video_url`.
    pub fn encode(&self) -> String {
        format!("{},{}", self.bucket, self.key)
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for VideoRef {
    type Err = VideoRefError;

    /// Exactly two non-empty comma separated parts; anything else means the
    /// column was written by something other than this service.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(',').collect();
        match parts.as_slice() {
            [bucket, key] if !bucket.is_empty() && !key.is_empty() => {
                Ok(Self::new(*bucket, *key))
            }
            _ => Err(VideoRefError(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_reference_splits_back_into_bucket_and_key() {
        let cases = [
            ("videos", "/portrait/0b6f7c1e.mp4"),
            ("my-bucket.example", "/landscape/a.mp4"),
            ("b", "k"),
        ];
        for (bucket, key) in cases {
            let encoded = VideoRef::new(bucket, key).encode();
            let parts: Vec<&str> = encoded.split(',').collect();
            assert_eq!(parts, vec![bucket, key]);
            assert_eq!(encoded.parse::<VideoRef>().unwrap(), VideoRef::new(bucket, key));
        }
    }

    #[test]
    fn stored_form_matches_column_layout() {
        let reference = VideoRef::new("tubes", "/square/abc.mp4");
        assert_eq!(reference.to_string(), "tubes,/square/abc.mp4");
    }

    #[test]
    fn malformed_values_are_rejected() {
        for raw in [
            "",
            "no-comma",
            ",key",
            "bucket,",
            "a,b,c",
            "https://bucket.s3.amazonaws.com/key.mp4",
        ] {
            assert!(raw.parse::<VideoRef>().is_err(), "accepted {raw:?}");
        }
    }
}

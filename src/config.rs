use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments. Built once at startup
/// and handed to every component; nothing reads the environment afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub assets_root: PathBuf,
    pub tmp_dir: PathBuf,
    pub jwt_secret: String,
    pub platform: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
    pub public_base_url: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Video hosting backend")]
pub struct Args {
    /// Host to bind to (overrides VIDEO_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIDEO_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides VIDEO_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory served under /assets (overrides VIDEO_STORE_ASSETS_ROOT)
    #[arg(long)]
    pub assets_root: Option<PathBuf>,

    /// Directory for transient upload buffers (overrides VIDEO_STORE_TMP_DIR)
    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,

    /// Object store bucket (overrides VIDEO_STORE_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // A missing .env file is fine; real deployments set the variables directly.
        let _ = dotenvy::dotenv();
        let args = Args::parse();
        Self::from_sources(args, |name| env::var(name).ok())
    }

    /// Merge parsed arguments with a variable lookup. CLI values win.
    pub fn from_sources(
        args: Args,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, bool)> {
        let var = |suffix: &str| {
            lookup(&format!("VIDEO_STORE_{suffix}")).filter(|value| !value.is_empty())
        };

        // --- Environment fallback ---
        let env_port = match var("PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing VIDEO_STORE_PORT value `{}`", value))?,
            None => 8091,
        };
        let port = args.port.unwrap_or(env_port);

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None => bail!("environment variable VIDEO_STORE_JWT_SECRET is not set"),
        };
        let s3_bucket = match args.s3_bucket.or_else(|| var("S3_BUCKET")) {
            Some(bucket) => bucket,
            None => bail!("environment variable VIDEO_STORE_S3_BUCKET is not set"),
        };
        if s3_bucket.contains(',') {
            bail!("VIDEO_STORE_S3_BUCKET must not contain a comma");
        }

        // --- Merge ---
        let cfg = Self {
            host: args
                .host
                .or_else(|| var("HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url: args
                .database_url
                .or_else(|| var("DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/video_store.db".into()),
            assets_root: args
                .assets_root
                .or_else(|| var("ASSETS_ROOT").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("./data/assets")),
            tmp_dir: args
                .tmp_dir
                .or_else(|| var("TMP_DIR").map(PathBuf::from))
                .unwrap_or_else(env::temp_dir),
            jwt_secret,
            platform: var("PLATFORM").unwrap_or_else(|| "prod".into()),
            s3_bucket,
            s3_region: var("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            s3_endpoint: var("S3_ENDPOINT"),
            ffprobe_path: var("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".into()),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".into()),
            public_base_url: var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_dev(&self) -> bool {
        self.platform == "dev"
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8091,
            database_url: "sqlite::memory:".into(),
            assets_root: PathBuf::from("./data/assets"),
            tmp_dir: env::temp_dir(),
            jwt_secret: String::new(),
            platform: "prod".into(),
            s3_bucket: String::new(),
            s3_region: "us-east-1".into(),
            s3_endpoint: None,
            ffprobe_path: "ffprobe".into(),
            ffmpeg_path: "ffmpeg".into(),
            public_base_url: "http://localhost:8091".into(),
        }
    }
}

//! Filevault - chunked uploads with client-side encryption

use clap::{Parser, Subcommand};
use filevault_cli::{commands, ClientSettings, UploadOptions};
use filevault_client::CancellationToken;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "filevault")]
#[command(about = "Chunked uploads and client-side encryption for filevault")]
#[command(version)]
struct Args {
    /// API base URL
    #[arg(long, default_value = "http://localhost:8000/api", env = "FILEVAULT_API_URL", global = true)]
    api_url: String,

    /// Bearer access token
    #[arg(long, env = "FILEVAULT_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    /// Chunk size in bytes
    #[arg(long, default_value_t = 1_048_576, env = "FILEVAULT_CHUNK_SIZE", global = true)]
    chunk_size: u64,

    /// Maximum file size in bytes
    #[arg(long, default_value_t = 104_857_600, env = "FILEVAULT_MAX_FILE_SIZE", global = true)]
    max_file_size: u64,

    /// Comma-separated allowed content types (defaults to the built-in list)
    #[arg(long, env = "FILEVAULT_ALLOWED_TYPES", value_delimiter = ',', global = true)]
    allowed_types: Vec<String>,

    /// Encryption algorithm
    #[arg(long, default_value = "AES-GCM", env = "FILEVAULT_ENCRYPTION_ALGORITHM", global = true)]
    encryption_algorithm: String,

    /// Key length in bits (128 or 256)
    #[arg(long, default_value_t = 256, env = "FILEVAULT_KEY_LENGTH", global = true)]
    key_length: u32,

    /// IV length in bytes
    #[arg(long, default_value_t = 12, env = "FILEVAULT_IV_LENGTH", global = true)]
    iv_length: usize,

    /// Request and per-chunk timeout in seconds
    #[arg(long, default_value_t = 30, env = "FILEVAULT_TIMEOUT_SECS", global = true)]
    timeout_secs: u64,

    /// Verify chunk checksums returned by the backend
    #[arg(
        long,
        default_value_t = true,
        env = "FILEVAULT_VERIFY_CHECKSUMS",
        action = clap::ArgAction::Set,
        global = true
    )]
    verify_checksums: bool,

    /// Enable debug logging
    #[arg(short, long, env = "FILEVAULT_DEBUG", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file in chunks
    Upload {
        /// File to upload
        path: PathBuf,
        /// Encrypt the file before uploading and print the key
        #[arg(long)]
        encrypt: bool,
        /// Name to upload the file under
        #[arg(long)]
        name: Option<String>,
        /// Content type (guessed from the extension by default)
        #[arg(long)]
        content_type: Option<String>,
        /// Do not print progress
        #[arg(short, long)]
        quiet: bool,
    },
    /// Encrypt a local file and print its key
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// Output path (defaults to `<input>.enc`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decrypt a local file
    Decrypt {
        /// Encrypted file
        input: PathBuf,
        /// Output path
        #[arg(short, long)]
        output: PathBuf,
        /// Key printed by `encrypt`
        #[arg(long, env = "FILEVAULT_KEY", hide_env_values = true)]
        key: String,
    },
    /// Generate a new encryption key
    Keygen,
    /// Download a file by id
    Download {
        /// File id
        file_id: String,
        /// Output file or directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Decrypt with this key after downloading
        #[arg(long, env = "FILEVAULT_KEY", hide_env_values = true)]
        key: Option<String>,
    },
}

impl Args {
    fn settings(&self) -> ClientSettings {
        ClientSettings {
            api_url: self.api_url.clone(),
            access_token: self.access_token.clone(),
            chunk_size: self.chunk_size,
            max_file_size: self.max_file_size,
            allowed_types: self.allowed_types.clone(),
            encryption_algorithm: self.encryption_algorithm.clone(),
            key_length: self.key_length,
            iv_length: self.iv_length,
            timeout_secs: self.timeout_secs,
            verify_checksums: self.verify_checksums,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse arguments
    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("filevault_cli={0},filevault_client={0},filevault_crypto={0}", log_level).into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = args.settings();
    tracing::debug!(api_url = %settings.api_url, chunk_size = settings.chunk_size, "Settings loaded");

    match args.command {
        Command::Upload {
            path,
            encrypt,
            name,
            content_type,
            quiet,
        } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, stopping after the current chunk");
                    on_signal.cancel();
                }
            });

            let options = UploadOptions {
                path,
                name,
                content_type,
                encrypt,
                quiet,
            };
            let outcome = commands::upload(&settings, &options, cancel).await?;
            commands::print_record(&mut std::io::stdout().lock(), &outcome)?;
        }
        Command::Encrypt { input, output } => {
            let output = output.unwrap_or_else(|| {
                let mut name = input.clone().into_os_string();
                name.push(".enc");
                PathBuf::from(name)
            });
            let key = commands::encrypt(&settings, &input, &output).await?;
            eprintln!("Encrypted {} -> {}", input.display(), output.display());
            println!("{}", key);
        }
        Command::Decrypt { input, output, key } => {
            commands::decrypt(&settings, &input, &output, &key).await?;
            eprintln!("Decrypted {} -> {}", input.display(), output.display());
        }
        Command::Keygen => {
            println!("{}", commands::keygen(&settings)?);
        }
        Command::Download {
            file_id,
            output,
            key,
        } => {
            let path = commands::download(&settings, &file_id, output.as_deref(), key.as_deref()).await?;
            eprintln!("Saved {}", path.display());
        }
    }

    Ok(())
}

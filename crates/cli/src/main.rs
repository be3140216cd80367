//! Developer CLI for airlift.

mod api_client;
mod archive;

use airlift_cipher::{CipherError, EncryptedPayload, KeyPair, keystore};
use airlift_core::config::ProjectConfig;
use airlift_core::retention::{self, RangeFilter, RetentionAction};
use airlift_core::version::UNKNOWN_VERSION;
use airlift_core::{AppId, Channel, DEFAULT_KEEP_VERSIONS, VersionId};
use anyhow::{Context, Result};
use api_client::{ApiClient, CreateAppRequest, CreateUploadRequest, RegisterVersionRequest};
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Project configuration file, read from the working directory.
const PROJECT_CONFIG_FILE: &str = "airlift.toml";

/// Client config written by `login --local`.
const LOCAL_CLIENT_CONFIG_FILE: &str = "airlift-client.toml";

/// Extension appended to encrypted bundle files.
const ENCRYPTED_EXTENSION: &str = "enc";

#[derive(Parser)]
#[command(name = "airlift")]
#[command(about = "Manage app update bundles and channels in the airlift store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ClientConfigArgs {
    /// Client config file path
    #[arg(long, global = true, env = "AIRLIFT_CLIENT_CONFIG")]
    client_config: Option<String>,
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// API key (overrides client config)
    #[arg(long, global = true)]
    apikey: Option<String>,

    /// Remote store API URL (overrides client and project config)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(flatten)]
    client: ClientConfigArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify an API key and save it for later commands
    Login {
        /// API key to save
        #[arg(value_name = "APIKEY")]
        key: Option<String>,
        /// Save to ./airlift-client.toml instead of the user config
        #[arg(long, default_value_t = false)]
        local: bool,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// App management commands
    App {
        #[command(subcommand)]
        command: AppCommands,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Bundle management commands
    Bundle {
        #[command(subcommand)]
        command: BundleCommands,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Channel management commands
    Channel {
        #[command(subcommand)]
        command: ChannelCommands,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Key management commands
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// Register a new app
    Add {
        /// App identifier (reverse-DNS, e.g. com.example.app)
        app_id: Option<String>,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List registered apps
    List,
    /// Delete an app and everything it owns
    Delete {
        /// App identifier
        app_id: Option<String>,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum BundleCommands {
    /// Upload a new bundle version
    Upload {
        /// App identifier
        app_id: Option<String>,
        /// File or directory to upload (directories are packed to tar+zstd)
        #[arg(short, long)]
        path: Option<PathBuf>,
        /// Bundle version name (default: version from airlift.toml)
        #[arg(short, long)]
        bundle: Option<String>,
        /// Channel to publish the bundle to after upload
        #[arg(short, long)]
        channel: Option<String>,
        /// Register an externally hosted bundle instead of uploading
        #[arg(short, long, conflicts_with = "path")]
        external: Option<String>,
        /// Path to the public encryption key
        #[arg(long, conflicts_with = "key_data")]
        key: Option<PathBuf>,
        /// Public encryption key (PEM or base64-wrapped PEM)
        #[arg(long)]
        key_data: Option<String>,
        /// Upload unencrypted even if a key is available
        #[arg(long, conflicts_with_all = ["key", "key_data"])]
        no_key: bool,
        /// Use the legacy direct-RSA mode (small payloads only)
        #[arg(long)]
        direct: bool,
        /// Print the wrapped session key after encrypting
        #[arg(long)]
        show_session: bool,
        /// Start a progressive deploy on the channel
        #[arg(long, overrides_with = "no_progressive")]
        progressive: bool,
        /// Cut the channel over immediately
        #[arg(long)]
        no_progressive: bool,
    },
    /// List active bundle versions
    List {
        /// App identifier
        app_id: Option<String>,
    },
    /// Delete one bundle version
    Delete {
        /// Version name to delete
        version: String,
        /// App identifier
        app_id: Option<String>,
    },
    /// Remove old bundle versions, keeping recent and channel-linked ones
    Cleanup {
        /// App identifier
        app_id: Option<String>,
        /// Lower semver bound; cleanup covers this up to the next major
        #[arg(short, long)]
        bundle: Option<String>,
        /// Number of recent unused versions to keep
        #[arg(short, long, default_value_t = DEFAULT_KEEP_VERSIONS)]
        keep: usize,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Encrypt a bundle file for the configured public key
    Encrypt {
        /// File to encrypt
        path: PathBuf,
        /// Path to the public encryption key
        #[arg(long, conflicts_with = "key_data")]
        key: Option<PathBuf>,
        /// Public encryption key (PEM or base64-wrapped PEM)
        #[arg(long)]
        key_data: Option<String>,
        /// Use the legacy direct-RSA mode (small payloads only)
        #[arg(long)]
        direct: bool,
        /// Print the wrapped session key after encrypting
        #[arg(long)]
        show_session: bool,
    },
    /// Decrypt an encrypted bundle file
    Decrypt {
        /// File to decrypt
        path: PathBuf,
        /// Output path (default: input with .enc stripped, or .dec appended)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Path to the private key
        #[arg(long, conflicts_with = "key_data")]
        key: Option<PathBuf>,
        /// Private key (PEM or base64-wrapped PEM)
        #[arg(long)]
        key_data: Option<String>,
    },
}

#[derive(Subcommand)]
enum ChannelCommands {
    /// Create a channel pointing at the 'unknown' placeholder
    Add {
        /// Channel name
        name: String,
        /// App identifier
        app_id: Option<String>,
    },
    /// List channels
    List {
        /// App identifier
        app_id: Option<String>,
    },
    /// Delete a channel
    Delete {
        /// Channel name
        name: String,
        /// App identifier
        app_id: Option<String>,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Update channel assignment and flags
    Set {
        /// Channel name
        name: String,
        /// App identifier
        app_id: Option<String>,
        /// Point the channel at this bundle version (direct cutover)
        #[arg(short, long, conflicts_with = "latest")]
        bundle: Option<String>,
        /// Point the channel at the version from airlift.toml
        #[arg(long)]
        latest: bool,
        /// Advance the progressive rollout to this fraction (0..=1)
        #[arg(long)]
        percentage: Option<f64>,
        /// Send updates to iOS devices
        #[arg(long, overrides_with = "no_ios")]
        ios: bool,
        /// Stop sending updates to iOS devices
        #[arg(long)]
        no_ios: bool,
        /// Send updates to Android devices
        #[arg(long, overrides_with = "no_android")]
        android: bool,
        /// Stop sending updates to Android devices
        #[arg(long)]
        no_android: bool,
        /// Allow devices to self-assign to this channel
        #[arg(long, overrides_with = "no_self_assign")]
        self_assign: bool,
        /// Forbid device self-assignment
        #[arg(long)]
        no_self_assign: bool,
        /// Start progressive deploys on future publishes
        #[arg(long, overrides_with = "no_progressive")]
        progressive: bool,
        /// Cut over immediately on future publishes
        #[arg(long)]
        no_progressive: bool,
        /// Make this the default channel for new devices
        #[arg(long, overrides_with = "no_public")]
        public: bool,
        /// Stop being the default channel
        #[arg(long)]
        no_public: bool,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate an RSA encryption key pair
    Generate {
        /// Directory to write the key files to (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },
    /// Show the public key for a private key
    Public {
        /// Path to private key file
        #[arg(short, long, group = "key_source")]
        file: Option<String>,
        /// Private key value directly
        #[arg(short, long, group = "key_source")]
        value: Option<String>,
        /// Read private key from AIRLIFT_PRIVATE_KEY env var
        #[arg(short, long, group = "key_source")]
        env: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let Cli { command } = Cli::parse();

    match command {
        Commands::Login { key, local, api } => handle_login_command(key, local, &api).await,
        Commands::App { command, api } => handle_app_command(command, &api).await,
        Commands::Bundle { command, api } => handle_bundle_command(command, &api).await,
        Commands::Channel { command, api } => handle_channel_command(command, &api).await,
        Commands::Key { command } => handle_key_command(command).await,
    }
}

// =============================================================================
// login
// =============================================================================

async fn handle_login_command(apikey: Option<String>, local: bool, api: &ApiArgs) -> Result<()> {
    let apikey = apikey
        .or_else(|| api.apikey.clone())
        .or_else(|| std::env::var("AIRLIFT_APIKEY").ok())
        .context("API key required: pass it as an argument or set AIRLIFT_APIKEY")?;

    let config_path = if local {
        PathBuf::from(LOCAL_CLIENT_CONFIG_FILE)
    } else {
        client_config_path(api.client.client_config.as_deref())?
    };
    let mut config = load_client_config(&config_path).await?;

    let project = load_project_config(Path::new("."))?;
    let api_url = api
        .api_url
        .clone()
        .or_else(|| config.api_url.clone())
        .unwrap_or_else(|| project.api.url.clone());

    let client = ApiClient::new(&api_url, &apikey)?;
    let me = client.me().await.context("API key verification failed")?;

    config.apikey = Some(apikey);
    if api.api_url.is_some() {
        config.api_url = api.api_url.clone();
    }
    save_client_config(&config_path, &config).await?;

    println!("Logged in as {}", me.user_id);
    if let Some(email) = &me.email {
        println!("  Email: {email}");
    }
    println!("Client config: {}", config_path.display());
    Ok(())
}

// =============================================================================
// app
// =============================================================================

async fn handle_app_command(command: AppCommands, api: &ApiArgs) -> Result<()> {
    let (client, config, project) = load_context(api).await?;

    match command {
        AppCommands::Add { app_id, name } => {
            let app_id = resolve_app_id(app_id, &project, &config)?;
            let app = client.create_app(CreateAppRequest { app_id, name }).await?;
            println!("✓ App added: {}", app.app_id);
            println!("Upload a bundle with: airlift bundle upload {}", app.app_id);
        }
        AppCommands::List => {
            let apps = client.list_apps().await?;
            if apps.is_empty() {
                println!("No apps found.");
            } else {
                println!("{:<32} {:<24} Created", "App ID", "Name");
                println!("{}", "-".repeat(80));
                for app in apps {
                    println!(
                        "{:<32} {:<24} {}",
                        app.app_id,
                        app.name.as_deref().unwrap_or("-"),
                        app.created_at
                    );
                }
            }
        }
        AppCommands::Delete { app_id, force } => {
            let app_id = resolve_app_id(app_id, &project, &config)?;
            if !force
                && !confirm(&format!(
                    "This will delete app '{app_id}' with all its bundles and channels.\nAre you sure?"
                ))?
            {
                println!("Deletion cancelled.");
                return Ok(());
            }
            client.delete_app(&app_id).await?;
            println!("✓ App deleted: {app_id}");
        }
    }
    Ok(())
}

// =============================================================================
// bundle
// =============================================================================

async fn handle_bundle_command(command: BundleCommands, api: &ApiArgs) -> Result<()> {
    match command {
        BundleCommands::Upload {
            app_id,
            path,
            bundle,
            channel,
            external,
            key,
            key_data,
            no_key,
            direct,
            show_session,
            progressive,
            no_progressive,
        } => {
            let (client, config, project) = load_context(api).await?;
            let app_id = resolve_app_id(app_id, &project, &config)?;
            let name = bundle.or_else(|| project.version.clone()).context(
                "no bundle version: pass --bundle or set version in airlift.toml",
            )?;

            let version = if let Some(url) = external {
                let version = client
                    .register_version(
                        &app_id,
                        RegisterVersionRequest {
                            name: name.clone(),
                            checksum: None,
                            external_url: Some(url.clone()),
                        },
                    )
                    .await?;
                println!("✓ Registered external bundle {name} -> {url}");
                version
            } else {
                let path = path.context("--path is required unless --external is given")?;
                let payload = read_bundle_payload(&path)?;
                let payload = seal_payload(
                    payload,
                    key_data.as_deref(),
                    key.as_deref(),
                    &project,
                    no_key,
                    direct,
                    show_session,
                )?;
                let checksum = sha256_hex(&payload);

                let version = client
                    .register_version(
                        &app_id,
                        RegisterVersionRequest {
                            name: name.clone(),
                            checksum: Some(checksum),
                            external_url: None,
                        },
                    )
                    .await?;
                let upload = client
                    .create_upload(
                        &app_id,
                        &name,
                        CreateUploadRequest {
                            content_length: payload.len() as u64,
                        },
                    )
                    .await?;
                let size = payload.len();
                client.put_payload(&upload.upload_url, payload).await?;
                println!("✓ Uploaded bundle {name} ({size} bytes)");
                version
            };

            if let Some(channel_name) = channel.or_else(|| project.channel.clone()) {
                publish_to_channel(
                    &client,
                    &app_id,
                    &channel_name,
                    version.id,
                    flag_override(progressive, no_progressive),
                )
                .await?;
            }
        }
        BundleCommands::List { app_id } => {
            let (client, config, project) = load_context(api).await?;
            let app_id = resolve_app_id(app_id, &project, &config)?;
            let versions = client.list_versions(&app_id, false).await?;
            if versions.is_empty() {
                println!("No bundles found.");
            } else {
                println!("{:<20} {:<18} Checksum", "Version", "Created");
                println!("{}", "-".repeat(72));
                for version in versions {
                    println!(
                        "{:<20} {:<18} {}",
                        version.name,
                        format_date(&version.created_at),
                        version.checksum.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        BundleCommands::Delete { version, app_id } => {
            let (client, config, project) = load_context(api).await?;
            let app_id = resolve_app_id(app_id, &project, &config)?;

            let record = client
                .get_version_by_name(&app_id, &version)
                .await?
                .with_context(|| format!("version not found: {version}"))?;
            let in_use: HashSet<VersionId> =
                client.in_use_version_ids(&app_id).await?.into_iter().collect();
            if in_use.contains(&record.id) {
                anyhow::bail!("version {version} is linked to a channel; unlink it first");
            }

            client.delete_version(&app_id, &version).await?;
            println!("✓ Bundle deleted: {version}");
        }
        BundleCommands::Cleanup {
            app_id,
            bundle,
            keep,
            force,
        } => {
            let (client, config, project) = load_context(api).await?;
            let app_id = resolve_app_id(app_id, &project, &config)?;
            handle_bundle_cleanup(&client, &app_id, bundle, keep, force).await?;
        }
        BundleCommands::Encrypt {
            path,
            key,
            key_data,
            direct,
            show_session,
        } => {
            let project = load_project_config(Path::new("."))?;
            let payload = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let public = keystore::resolve_public_key(
                key_data.as_deref(),
                key.as_deref(),
                Path::new("."),
                &project.encryption,
            )?;

            let sealed = if direct {
                airlift_cipher::encrypt_direct(&payload, &public)?
            } else {
                airlift_cipher::encrypt(&payload, &public)?
            };
            print_session_key(&sealed, show_session);

            let out = encrypted_output_path(&path);
            std::fs::write(&out, sealed.to_bytes())
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("✓ Encrypted {} -> {}", path.display(), out.display());
            println!("Key fingerprint: {}", sealed.fingerprint_hex());
        }
        BundleCommands::Decrypt {
            path,
            output,
            key,
            key_data,
        } => {
            let project = load_project_config(Path::new("."))?;
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let container = EncryptedPayload::from_bytes(&bytes)?;
            let private = keystore::resolve_private_key(
                key_data.as_deref(),
                key.as_deref(),
                Path::new("."),
                &project.encryption,
            )?;

            let payload = airlift_cipher::decrypt(&container, &private)?;
            let out = output.unwrap_or_else(|| decrypted_output_path(&path));
            std::fs::write(&out, payload)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("✓ Decrypted {} -> {}", path.display(), out.display());
        }
    }
    Ok(())
}

fn read_bundle_payload(path: &Path) -> Result<Vec<u8>> {
    if path.is_dir() {
        println!(
            "Packing {} into a {} archive...",
            path.display(),
            archive::ARCHIVE_EXTENSION
        );
        archive::pack_directory(path)
    } else {
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
    }
}

/// Encrypt the payload when a key is available.
///
/// An explicit `--key`/`--key-data` must resolve or the upload fails; with
/// neither given, a missing key degrades to an unencrypted upload with a
/// warning, since not every project sets up encryption.
fn seal_payload(
    payload: Vec<u8>,
    key_data: Option<&str>,
    key: Option<&Path>,
    project: &ProjectConfig,
    no_key: bool,
    direct: bool,
    show_session: bool,
) -> Result<Vec<u8>> {
    if no_key {
        return Ok(payload);
    }

    match keystore::resolve_public_key(key_data, key, Path::new("."), &project.encryption) {
        Ok(public) => {
            let sealed = if direct {
                airlift_cipher::encrypt_direct(&payload, &public)?
            } else {
                airlift_cipher::encrypt(&payload, &public)?
            };
            println!("Encrypted bundle for key {}", public.fingerprint_hex()?);
            print_session_key(&sealed, show_session);
            Ok(sealed.to_bytes())
        }
        Err(CipherError::KeyNotFound(_)) if key.is_none() && key_data.is_none() => {
            eprintln!("Warning: no encryption key found; uploading unencrypted bundle");
            Ok(payload)
        }
        Err(err) => Err(err.into()),
    }
}

fn print_session_key(sealed: &EncryptedPayload, show_session: bool) {
    if show_session && let Some(wrapped) = sealed.wrapped_session_key() {
        println!(
            "Wrapped session key: {}",
            base64::engine::general_purpose::STANDARD.encode(wrapped)
        );
    }
}

async fn publish_to_channel(
    client: &ApiClient,
    app_id: &AppId,
    name: &str,
    new: VersionId,
    progressive_override: Option<bool>,
) -> Result<()> {
    match client.get_channel(app_id, name).await? {
        Some(mut channel) => {
            if let Some(enabled) = progressive_override {
                channel.enable_progressive_deploy = enabled;
            }
            let progressive = channel.enable_progressive_deploy;
            let outcome = channel.publish(new, progressive)?;
            if outcome.restarted_unfinished {
                eprintln!(
                    "Warning: previous progressive deploy on '{name}' had not finished; promoting its bundle to baseline"
                );
            }
            client.upsert_channel(&channel).await?;
            println!("✓ Published to channel {name} ({})", outcome.state);
        }
        None => {
            // First publish creates the channel serving the new bundle
            // outright; progressive deploys start from the next publish.
            let me = client.me().await?;
            let mut channel = Channel::new(app_id.clone(), name, me.user_id, new);
            if let Some(enabled) = progressive_override {
                channel.enable_progressive_deploy = enabled;
            }
            client.upsert_channel(&channel).await?;
            println!("✓ Created channel {name} serving the new bundle");
        }
    }
    Ok(())
}

async fn handle_bundle_cleanup(
    client: &ApiClient,
    app_id: &AppId,
    bundle: Option<String>,
    keep: usize,
    force: bool,
) -> Result<()> {
    let versions = client.list_versions(app_id, false).await?;
    println!("Total active versions: {}", versions.len());

    let in_use: HashSet<VersionId> = client.in_use_version_ids(app_id).await?.into_iter().collect();

    let range = bundle
        .as_deref()
        .map(RangeFilter::to_next_major)
        .transpose()?;
    if let Some(range) = &range {
        println!(
            "Considering versions from {} up to {} (exclusive)",
            range.lower, range.upper_exclusive
        );
    }

    let plan = retention::plan(&versions, &in_use, keep, range.as_ref())?;
    if plan.is_empty() {
        println!("No candidate versions found, nothing to do.");
        return Ok(());
    }

    println!("\n{:<20} Action", "Version");
    println!("{}", "-".repeat(48));
    for decision in &plan {
        let glyph = match decision.action {
            RetentionAction::KeepRecent => "✓",
            RetentionAction::KeepInUse => "✓ (linked to channel)",
            RetentionAction::Remove => "✗",
        };
        println!("{:<20} {glyph}", decision.name);
    }

    let to_remove: Vec<_> = plan
        .iter()
        .filter(|d| d.action == RetentionAction::Remove)
        .collect();
    if to_remove.is_empty() {
        println!("\nNothing to be removed.");
        return Ok(());
    }

    if !force && !confirm(&format!("\nRemove {} version(s)?", to_remove.len()))? {
        println!("Not confirmed, aborting removal.");
        return Ok(());
    }

    let mut removed = 0;
    let mut skipped = 0;
    for decision in to_remove {
        // A channel may have picked this version up since planning, so
        // re-check before each deletion and skip rather than fail.
        let still_in_use: HashSet<VersionId> = client
            .in_use_version_ids(app_id)
            .await?
            .into_iter()
            .collect();
        if still_in_use.contains(&decision.id) {
            eprintln!(
                "Warning: {} became linked to a channel, skipping",
                decision.name
            );
            skipped += 1;
            continue;
        }
        client.delete_version(app_id, &decision.name).await?;
        println!("Removed {}", decision.name);
        removed += 1;
    }

    println!("\nDone: {removed} removed, {skipped} skipped");
    Ok(())
}

// =============================================================================
// channel
// =============================================================================

async fn handle_channel_command(command: ChannelCommands, api: &ApiArgs) -> Result<()> {
    let (client, config, project) = load_context(api).await?;

    match command {
        ChannelCommands::Add { name, app_id } => {
            let app_id = resolve_app_id(app_id, &project, &config)?;
            let unknown = client
                .get_version_by_name(&app_id, UNKNOWN_VERSION)
                .await?
                .with_context(|| {
                    format!("app {app_id} has no '{UNKNOWN_VERSION}' placeholder version; register the app first")
                })?;
            let me = client.me().await?;

            let channel = Channel::new(app_id.clone(), &name, me.user_id, unknown.id);
            client.upsert_channel(&channel).await?;
            println!("✓ Channel created: {name}");
        }
        ChannelCommands::List { app_id } => {
            let app_id = resolve_app_id(app_id, &project, &config)?;
            let channels = client.list_channels(&app_id).await?;
            if channels.is_empty() {
                println!("No channels found.");
            } else {
                println!(
                    "{:<16} {:<10} {:<10} {:<10} {:<8} Public",
                    "Name", "State", "Bundle", "Canary", "Split"
                );
                println!("{}", "-".repeat(72));
                for channel in channels {
                    println!(
                        "{:<16} {:<10} {:<10} {:<10} {:<8} {}",
                        channel.name,
                        channel.state().to_string(),
                        channel.version.to_string(),
                        channel
                            .second_version
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        format!("{:.0}%", channel.secondary_percentage * 100.0),
                        channel.public
                    );
                }
            }
        }
        ChannelCommands::Delete {
            name,
            app_id,
            force,
        } => {
            let app_id = resolve_app_id(app_id, &project, &config)?;
            if !force && !confirm(&format!("This will delete channel '{name}'.\nAre you sure?"))? {
                println!("Deletion cancelled.");
                return Ok(());
            }
            client.delete_channel(&app_id, &name).await?;
            println!("✓ Channel deleted: {name}");
        }
        ChannelCommands::Set {
            name,
            app_id,
            bundle,
            latest,
            percentage,
            ios,
            no_ios,
            android,
            no_android,
            self_assign,
            no_self_assign,
            progressive,
            no_progressive,
            public,
            no_public,
        } => {
            let app_id = resolve_app_id(app_id, &project, &config)?;
            let mut channel = client
                .get_channel(&app_id, &name)
                .await?
                .with_context(|| format!("channel not found: {name}"))?;
            let mut changed = false;

            let target = if latest {
                Some(project.version.clone().context(
                    "--latest requires a version in airlift.toml",
                )?)
            } else {
                bundle
            };
            if let Some(target) = target {
                let version = client
                    .get_version_by_name(&app_id, &target)
                    .await?
                    .with_context(|| format!("version not found: {target}"))?;
                channel.cutover(version.id);
                println!("Channel {name} now serves {target}");
                changed = true;
            }

            if let Some(percentage) = percentage {
                let state = channel.advance(percentage)?;
                println!("✓ Rollout advanced, channel is now {state}");
                changed = true;
            }

            for (field, value) in [
                (&mut channel.ios, flag_override(ios, no_ios)),
                (&mut channel.android, flag_override(android, no_android)),
                (
                    &mut channel.allow_device_self_set,
                    flag_override(self_assign, no_self_assign),
                ),
                (
                    &mut channel.enable_progressive_deploy,
                    flag_override(progressive, no_progressive),
                ),
                (&mut channel.public, flag_override(public, no_public)),
            ] {
                if let Some(value) = value {
                    *field = value;
                    changed = true;
                }
            }

            // A record read back with a finished split collapses to its
            // stable form rather than being written back as-is.
            if channel.normalize() {
                println!("Rollout on {name} had completed; promoting its bundle to baseline");
                changed = true;
            }

            if !changed {
                println!("No changes specified.");
                return Ok(());
            }

            channel.validate()?;
            client.upsert_channel(&channel).await?;
            println!("✓ Channel updated: {name}");
        }
    }
    Ok(())
}

// =============================================================================
// key
// =============================================================================

async fn handle_key_command(command: KeyCommands) -> Result<()> {
    match command {
        KeyCommands::Generate { output, force } => {
            let dir = output.unwrap_or_else(|| PathBuf::from("."));
            let private_path = dir.join(keystore::PRIVATE_KEY_FILE);
            let public_path = dir.join(keystore::PUBLIC_KEY_FILE);

            if !force && (private_path.exists() || public_path.exists()) {
                anyhow::bail!(
                    "key files already exist in {}; use --force to overwrite",
                    dir.display()
                );
            }

            println!("Generating RSA-2048 key pair...");
            let keys = KeyPair::generate()?;
            let public_pem = keys.public.to_pem()?;

            write_key_file(&private_path, &keys.private.to_pem()?, 0o600)?;
            write_key_file(&public_path, &public_pem, 0o644)?;

            println!("Private key written to: {}", private_path.display());
            println!("Public key written to: {}", public_path.display());
            println!("\nPublic key:");
            println!("{public_pem}");
            println!("Fingerprint: {}", keys.public.fingerprint_hex()?);
            println!("To pin the key in airlift.toml, add:");
            println!("  [encryption]");
            println!(
                "  public_key = \"{}\"",
                base64::engine::general_purpose::STANDARD.encode(&public_pem)
            );
        }
        KeyCommands::Public { file, value, env } => {
            let pem = if let Some(path) = file {
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read key file: {path}"))?
            } else if let Some(key) = value {
                key
            } else if env {
                std::env::var("AIRLIFT_PRIVATE_KEY")
                    .context("AIRLIFT_PRIVATE_KEY environment variable not set")?
            } else {
                anyhow::bail!("one of --file, --value, or --env is required");
            };

            let private = keystore::parse_private_key_data(&pem)?;
            let public = private.public_key();
            println!("{}", public.to_pem()?);
            println!("Fingerprint: {}", public.fingerprint_hex()?);
        }
    }
    Ok(())
}

fn write_key_file(path: &Path, pem: &str, mode: u32) -> Result<()> {
    std::fs::write(path, pem).with_context(|| format!("failed to write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

// =============================================================================
// configuration and shared helpers
// =============================================================================

#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
#[serde(default)]
struct ClientConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    apikey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_app: Option<String>,
}

async fn load_context(api: &ApiArgs) -> Result<(ApiClient, ClientConfig, ProjectConfig)> {
    let project = load_project_config(Path::new("."))?;
    let config_path = client_config_path(api.client.client_config.as_deref())?;
    let config = load_client_config(&config_path).await?;

    let apikey = resolve_apikey(api.apikey.as_deref(), &config)?;
    let api_url = api
        .api_url
        .clone()
        .or_else(|| config.api_url.clone())
        .unwrap_or_else(|| project.api.url.clone());

    let client = ApiClient::new(&api_url, &apikey)?;
    Ok((client, config, project))
}

fn resolve_apikey(flag: Option<&str>, config: &ClientConfig) -> Result<String> {
    if let Some(apikey) = flag {
        return Ok(apikey.to_string());
    }
    if let Ok(apikey) = std::env::var("AIRLIFT_APIKEY") {
        return Ok(apikey);
    }
    config
        .apikey
        .clone()
        .context("no API key: pass --apikey, set AIRLIFT_APIKEY, or run `airlift login`")
}

fn resolve_app_id(
    positional: Option<String>,
    project: &ProjectConfig,
    config: &ClientConfig,
) -> Result<AppId> {
    let raw = positional
        .or_else(|| project.app_id.clone())
        .or_else(|| config.default_app.clone())
        .context("no app id: pass APP_ID or set app_id in airlift.toml")?;
    Ok(AppId::parse(&raw)?)
}

fn client_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = std::env::var_os("AIRLIFT_CLIENT_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    // A config saved by `login --local` wins over the user config.
    let local = PathBuf::from(LOCAL_CLIENT_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(path) => PathBuf::from(path),
        None => {
            let home = std::env::var_os("HOME")
                .ok_or_else(|| anyhow::anyhow!("HOME not set; set AIRLIFT_CLIENT_CONFIG"))?;
            PathBuf::from(home).join(".config")
        }
    };

    Ok(base.join("airlift").join("client.toml"))
}

async fn load_client_config(path: &Path) -> Result<ClientConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("AIRLIFT_").split("__"));

    match figment.extract() {
        Ok(config) => Ok(config),
        Err(_) if !path.exists() => Ok(ClientConfig::default()),
        Err(err) => Err(anyhow::anyhow!(err).context("failed to load client configuration")),
    }
}

async fn save_client_config(path: &Path, config: &ClientConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = toml::to_string_pretty(config)?;

    tokio::fs::write(path, contents).await?;

    // Set restrictive permissions (0600) since the file contains the API key
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

fn load_project_config(dir: &Path) -> Result<ProjectConfig> {
    let path = dir.join(PROJECT_CONFIG_FILE);
    let mut figment = Figment::new();

    if path.exists() {
        figment = figment.merge(Toml::file(&path));
    }

    figment = figment.merge(Env::prefixed("AIRLIFT_").split("__"));

    let config: ProjectConfig = figment
        .extract()
        .context("failed to load project configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid {PROJECT_CONFIG_FILE}: {e}"))?;
    Ok(config)
}

/// Combine a `--flag` / `--no-flag` pair into an explicit override.
fn flag_override(enable: bool, disable: bool) -> Option<bool> {
    match (enable, disable) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::Write;
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

fn encrypted_output_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ENCRYPTED_EXTENSION);
    PathBuf::from(name)
}

fn decrypted_output_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == ENCRYPTED_EXTENSION => path.with_extension(""),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".dec");
            PathBuf::from(name)
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn format_date(timestamp: &OffsetDateTime) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
    timestamp
        .format(&format)
        .unwrap_or_else(|_| timestamp.to_string())
}

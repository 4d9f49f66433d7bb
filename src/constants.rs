//! # Kitt Constants
//!
//! Label keys, image naming, runtime defaults and vault parameters. These
//! constants are the **single source of truth** for the data contract shared
//! between build time, image labels and run time.
//!
//! ## Modification Guidelines
//!
//! Label keys and contract defaults are persisted inside images that may
//! outlive the binary that built them. Before modifying any of them:
//! 1. Check whether existing images can still be read by the new value
//! 2. Update the contract tests in `tests/contract_tests.rs`
//!
//! ## Cross-References
//!
//! - [`crate::contract`]: Uses label keys and runtime defaults
//! - [`crate::crypto`]: Uses the vault KDF and cipher sizes
//! - [`crate::vault`]: Uses the ephemeral filesystem prefix
//! - [`crate::engine`]: Uses engine binaries and socket paths

// =============================================================================
// Image Labels
// =============================================================================
//
// Everything needed to start a kitt container lives in image labels. The
// configuration file used at build time is never required again.
// =============================================================================

/// Label holding the JSON-encoded runtime contract.
pub const CONFIG_LABEL: &str = "kitt-config";

/// Legacy label that some older images use to carry the sealed vault.
///
/// Read only when the contract's own `vault` field is empty.
pub const LEGACY_VAULT_LABEL: &str = "kitt-vault";

/// Repository under which every kitt image is tagged (`kitt:<name>`).
pub const IMAGE_REPOSITORY: &str = "kitt";

/// Suffix appended to the tag of a patched image.
pub const PATCH_TAG_SUFFIX: &str = "-patch";

/// Tag that `pull` warns about.
pub const DEPRECATED_TAG: &str = "latest";

// =============================================================================
// Runtime Contract Defaults
// =============================================================================

/// Hostname used when the contract does not name one.
pub const DEFAULT_HOSTNAME: &str = "kitt";

/// Command used when the contract does not name one.
pub const DEFAULT_COMMAND: &str = "bash";

/// Container user used when the contract does not name one.
pub const DEFAULT_USER: &str = "user";

/// Entrypoint baked into every kitt image. `fixuid` remaps the in-image user
/// to the uid/gid the container is started with.
pub const DEFAULT_ENTRYPOINT: &str = "fixuid -q";

/// Base image used when the workspace does not name one.
pub const DEFAULT_BASE_IMAGE: &str = "ubuntu:22.04";

/// Placeholder expanded against the invoking user's home directory in
/// host-side volume paths.
pub const HOME_PLACEHOLDER: &str = "$HOME";

/// Capabilities granted to every kitt container.
pub const CONTAINER_CAPABILITIES: &[&str] = &["CAP_NET_RAW", "CAP_NET_ADMIN", "CAP_IPC_LOCK"];

/// Loopback address the container hostname resolves to.
pub const HOST_ALIAS_ADDRESS: &str = "127.0.0.1";

/// Host group granting access to the container engine socket.
pub const ENGINE_GROUP: &str = "docker";

/// In-container path of the engine socket for docker-in-docker.
pub const ENGINE_SOCKET_BIND: &str = "/var/run/docker.sock";

/// Host side of the docker-in-docker volume as stored in the contract.
///
/// Replaced at run time by the socket of the engine actually in use.
pub const ENGINE_SOCKET_PLACEHOLDER: &str = "$ENGINE_SOCKET";

/// X11 display variable forwarded into the container.
pub const DISPLAY_ENV: &str = "DISPLAY";

// =============================================================================
// Volume Modes
// =============================================================================

/// Read-only bind mode.
pub const MODE_READ_ONLY: &str = "ro";

/// Read-write bind mode.
pub const MODE_READ_WRITE: &str = "rw";

/// Mode applied to `--volume` flags that omit one.
pub const DEFAULT_FLAG_VOLUME_MODE: &str = MODE_READ_ONLY;

/// Mode applied to configured workspace volumes that omit one.
pub const DEFAULT_CONFIG_VOLUME_MODE: &str = MODE_READ_WRITE;

// =============================================================================
// Vault Cryptography
// =============================================================================
//
// Tokens are `base64(VERSION || salt || nonce || ciphertext+tag)`. The salt
// is random per token, so the same password never yields the same key twice.
// =============================================================================

/// Version byte prefixed to every sealed token.
pub const VAULT_TOKEN_VERSION: u8 = 1;

/// Size of the Argon2 salt in bytes.
pub const VAULT_SALT_SIZE: usize = 16;

/// Size of the XChaCha20-Poly1305 nonce in bytes.
pub const VAULT_NONCE_SIZE: usize = 24;

/// Size of the symmetric key in bytes.
pub const VAULT_KEY_SIZE: usize = 32;

/// Argon2id memory cost in KiB (19 MiB, OWASP interactive minimum).
pub const VAULT_KDF_MEMORY_KIB: u32 = 19 * 1024;

/// Argon2id iteration count.
pub const VAULT_KDF_ITERATIONS: u32 = 2;

/// Argon2id parallelism.
pub const VAULT_KDF_PARALLELISM: u32 = 1;

/// Prefix of the ephemeral directory holding decrypted secret files.
pub const VAULT_FS_PREFIX: &str = "kitt-vault-";

// =============================================================================
// Local Settings
// =============================================================================

/// Directory (under the user config dir) holding kitt's local settings.
pub const SETTINGS_DIR: &str = "kitt";

/// Driver preference file name.
pub const SETTINGS_FILE: &str = "config.json";

/// Editor used by `patch` when `$EDITOR` is unset.
pub const DEFAULT_EDITOR: &str = "vi";

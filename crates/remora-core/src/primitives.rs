//! # Runtime Primitives
//!
//! Hardcoded runtime constants for the Remora CORE.
//!
//! These limits are compiled into the binary and are immutable at runtime.
//! They bound the work a single remote definition can cause.

/// File name of the manifest below the registry base URL.
///
/// - Registry endpoint = `{base_url}/components.json`
pub const MANIFEST_FILE: &str = "components.json";

/// Maximum length of a single definition's source text (256 KB).
///
/// Longer sources are rejected by the Compiler before parsing.
pub const MAX_SOURCE_LENGTH: usize = 256 * 1024;

/// Maximum size of a manifest response body (16 MB).
///
/// Bodies larger than this are rejected by the registry client.
pub const MAX_MANIFEST_BYTES: usize = 16 * 1024 * 1024;

/// Maximum nesting of function calls while evaluating a definition.
///
/// Runaway recursion inside a definition surfaces as an `EvalError`
/// instead of overflowing the host stack.
pub const MAX_CALL_DEPTH: usize = 128;

/// Maximum syntactic nesting of a single definition.
///
/// Brackets, JSX elements, operator chains and arrow bodies each add a
/// level. Deeper sources are rejected as syntax errors before parsing.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Maximum nesting of a rendered value (arrays, objects, elements).
pub const MAX_VALUE_DEPTH: usize = 256;

/// Stack reserved for the thread that parses, evaluates and renders
/// definitions (256 MB).
///
/// Sized for `MAX_CALL_DEPTH` calls of `MAX_NESTING_DEPTH` deep bodies in
/// an unoptimized build. Pages are only committed as they are touched.
pub const EVAL_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Default number of request/settle passes a scope graph runs before giving up.
///
/// A graph of depth `d` settles in at most `d + 2` passes; this bound only
/// matters for pathological configurations.
pub const DEFAULT_RESOLVE_PASSES: usize = 64;

/// Version tag mixed into every scope fingerprint.
///
/// Increment this when changing the canonical scope encoding.
pub const FINGERPRINT_VERSION: u8 = 1;

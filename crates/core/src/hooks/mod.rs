//! Function interception
//!
//! Inline hooks rewrite the entry of a native function so every caller lands
//! in a replacement; the replacement reaches the untouched behavior through
//! a trampoline published in an [`OriginalFn`] slot.

mod arch;
pub mod inline;
pub mod interceptor;
pub mod original;
mod patch;
mod trampoline;

pub use inline::{
    create_inline_hook, inline_hook_count, inline_hook_info, is_hooked, HookError,
    InlineHookInfo, InlineHookKey,
};
pub use interceptor::{InlineInterceptor, InstalledHook, Interceptor};
pub use original::OriginalFn;

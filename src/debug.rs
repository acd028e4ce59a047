//! Debug logging utilities for x86mem.
//!
//! Set the `X86MEM_DEBUG` environment variable to enable verbose logging:
//! - `X86MEM_DEBUG=1` - Enable all debug output
//! - `X86MEM_DEBUG=alloc` - Enable only page allocator logs
//! - `X86MEM_DEBUG=a20` - Enable only A20 gate logs
//! - `X86MEM_DEBUG=alloc,handler,hardware` - Enable multiple categories
//!
//! The per-access hot path never logs.

use std::sync::OnceLock;

/// Debug categories that can be enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCategory {
    Alloc,
    A20,
    Handler,
    Hardware,
    All,
}

/// Cached debug configuration
static DEBUG_CONFIG: OnceLock<DebugConfig> = OnceLock::new();

#[derive(Debug, Default)]
struct DebugConfig {
    enabled: bool,
    alloc: bool,
    a20: bool,
    handler: bool,
    hardware: bool,
}

impl DebugConfig {
    fn parse(val: &str) -> Self {
        let val_lower = val.to_lowercase();
        if val_lower == "1" || val_lower == "all" {
            return Self {
                enabled: true,
                alloc: true,
                a20: true,
                handler: true,
                hardware: true,
            };
        }
        Self {
            enabled: true,
            alloc: val_lower.contains("alloc"),
            a20: val_lower.contains("a20"),
            handler: val_lower.contains("handler"),
            hardware: val_lower.contains("hardware"),
        }
    }

    fn from_env() -> Self {
        match std::env::var("X86MEM_DEBUG") {
            Ok(val) => Self::parse(&val),
            Err(_) => Self::default(),
        }
    }

    fn allows(&self, category: DebugCategory) -> bool {
        if !self.enabled {
            return false;
        }
        match category {
            DebugCategory::All => self.alloc || self.a20 || self.handler || self.hardware,
            DebugCategory::Alloc => self.alloc,
            DebugCategory::A20 => self.a20,
            DebugCategory::Handler => self.handler,
            DebugCategory::Hardware => self.hardware,
        }
    }
}

fn get_config() -> &'static DebugConfig {
    DEBUG_CONFIG.get_or_init(DebugConfig::from_env)
}

/// Check if debug logging is enabled for a category
pub fn is_debug_enabled(category: DebugCategory) -> bool {
    get_config().allows(category)
}

/// Debug print macro for page allocator logs
#[macro_export]
macro_rules! debug_alloc {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled($crate::debug::DebugCategory::Alloc) {
            eprintln!("[mem:alloc] {}", format_args!($($arg)*));
        }
    };
}

/// Debug print macro for A20 gate logs
#[macro_export]
macro_rules! debug_a20 {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled($crate::debug::DebugCategory::A20) {
            eprintln!("[mem:a20] {}", format_args!($($arg)*));
        }
    };
}

/// Debug print macro for page handler table logs
#[macro_export]
macro_rules! debug_handler {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled($crate::debug::DebugCategory::Handler) {
            eprintln!("[mem:handler] {}", format_args!($($arg)*));
        }
    };
}

/// Debug print macro for hardware reservation logs
#[macro_export]
macro_rules! debug_hardware {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled($crate::debug::DebugCategory::Hardware) {
            eprintln!("[mem:hw] {}", format_args!($($arg)*));
        }
    };
}

//! ---
//! gw_section: "03-logging"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Structured operation logging for gateway calls."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
#[doc(hidden)]
#[macro_export]
macro_rules! __gw_event {
    ($level:expr, $ctx:expr, error = $err:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext = &$ctx;
        $crate::tracing::event!(
            $level,
            operation = ctx.operation.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            layer = ctx.layer.unwrap_or(""),
            error = %$err,
            message = %format_args!($($arg)+)
        );
    }};
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext = &$ctx;
        $crate::tracing::event!(
            $level,
            operation = ctx.operation.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            layer = ctx.layer.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with gateway context.
#[macro_export]
macro_rules! gw_info {
    (context = $ctx:expr, $($rest:tt)+) => {
        $crate::__gw_event!($crate::tracing::Level::INFO, $ctx, $($rest)+)
    };
    ($($arg:tt)+) => {
        $crate::__gw_event!($crate::tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with gateway context.
#[macro_export]
macro_rules! gw_debug {
    (context = $ctx:expr, $($rest:tt)+) => {
        $crate::__gw_event!($crate::tracing::Level::DEBUG, $ctx, $($rest)+)
    };
    ($($arg:tt)+) => {
        $crate::__gw_event!($crate::tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with gateway context.
#[macro_export]
macro_rules! gw_warn {
    (context = $ctx:expr, $($rest:tt)+) => {
        $crate::__gw_event!($crate::tracing::Level::WARN, $ctx, $($rest)+)
    };
    ($($arg:tt)+) => {
        $crate::__gw_event!($crate::tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with gateway context.
#[macro_export]
macro_rules! gw_error {
    (context = $ctx:expr, $($rest:tt)+) => {
        $crate::__gw_event!($crate::tracing::Level::ERROR, $ctx, $($rest)+)
    };
    ($($arg:tt)+) => {
        $crate::__gw_event!($crate::tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}

use crate::auth::AuthUser;
use crate::security::RequestMeta;

/// Operator action record. Goes to the log only; there is no audit store.
pub fn record(meta: &RequestMeta, user: &AuthUser, action: &str, target: &str) {
    tracing::info!(
        target: "audit",
        request_id = %meta.request_id,
        user = %user.username,
        action,
        target_name = target,
        "'{}' {action} {target}",
        user.username
    );
}

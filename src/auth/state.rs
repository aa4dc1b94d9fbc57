//! Authentication state trait and macro.

use crate::service::TokenService;

/// Trait for state types that can validate access tokens.
pub trait HasTokenService {
    fn token_service(&self) -> &TokenService;
}

/// Macro to implement `HasTokenService` for state structs with the standard field.
///
/// The struct must have a `service: Arc<TokenService>` field.
///
/// # Example
/// ```ignore
/// use crate::impl_has_token_service;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub service: Arc<TokenService>,
/// }
///
/// impl_has_token_service!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_token_service {
    ($state_type:ty) => {
        impl $crate::auth::HasTokenService for $state_type {
            fn token_service(&self) -> &$crate::service::TokenService {
                &self.service
            }
        }
    };
}

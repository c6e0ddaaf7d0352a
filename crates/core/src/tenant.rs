//! Tenant resolution
//!
//! Caches ask "which tenant is the caller running as" on every operation.
//! The answer comes from a [`TenantResolver`] supplied at construction.

use std::cell::RefCell;

/// Tenant domain of the default (system) tenant
pub const DEFAULT_TENANT: &str = "";

/// Whether `tenant` denotes the default tenant
pub fn is_default_tenant(tenant: &str) -> bool {
    tenant == DEFAULT_TENANT
}

/// Source of the current tenant domain
pub trait TenantResolver: Send + Sync {
    /// Tenant domain of the calling context; [`DEFAULT_TENANT`] when none
    fn current_tenant_domain(&self) -> String;
}

/// Resolver that always answers the same tenant
#[derive(Debug, Clone, Default)]
pub struct FixedTenantResolver {
    tenant: String,
}

impl FixedTenantResolver {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self { tenant: tenant.into() }
    }

    /// Resolver for single-tenant deployments
    pub fn default_tenant() -> Self {
        Self::default()
    }
}

impl TenantResolver for FixedTenantResolver {
    fn current_tenant_domain(&self) -> String {
        self.tenant.clone()
    }
}

thread_local! {
    static CURRENT_TENANT: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Resolver backed by a thread-scoped tenant set with [`run_as`](Self::run_as)
///
/// ```
/// use repocache_core::tenant::{TenantResolver, ThreadTenantResolver, DEFAULT_TENANT};
///
/// let resolver = ThreadTenantResolver;
/// let seen = ThreadTenantResolver::run_as("acme.com", || resolver.current_tenant_domain());
/// assert_eq!(seen, "acme.com");
/// assert_eq!(resolver.current_tenant_domain(), DEFAULT_TENANT);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadTenantResolver;

impl ThreadTenantResolver {
    /// Run `work` with `tenant` as the current tenant of this thread
    ///
    /// The previous tenant is restored afterwards, also on unwind.
    pub fn run_as<R>(tenant: &str, work: impl FnOnce() -> R) -> R {
        struct Restore(Option<String>);
        impl Drop for Restore {
            fn drop(&mut self) {
                if let Some(previous) = self.0.take() {
                    CURRENT_TENANT.with(|current| *current.borrow_mut() = previous);
                }
            }
        }

        let previous =
            CURRENT_TENANT.with(|current| current.replace(tenant.to_string()));
        let _restore = Restore(Some(previous));
        work()
    }
}

impl TenantResolver for ThreadTenantResolver {
    fn current_tenant_domain(&self) -> String {
        CURRENT_TENANT.with(|current| current.borrow().clone())
    }
}

//! Request-to-call resolution.
//!
//! [`resolve`] binds a request to a registered class and produces a
//! [`DeferredCall`]. Nothing runs until [`DeferredCall::execute`]: construction
//! happens first, then the method lookup, then the call.

use std::sync::Arc;

use rmi_core::{Request, Value};
use tracing::debug;

use crate::error::CallError;
use crate::profile::Profile;
use crate::registry::{Arguments, ClassFactory, ClassRegistry};

/// A bound, not yet executed, method call.
pub struct DeferredCall {
    classname: String,
    method: String,
    factory: Arc<dyn ClassFactory>,
    constructor: Arguments,
    arguments: Arguments,
}

/// Binds `request` against `registry`, injecting `profile` as the `PROFILE` keyword.
///
/// A caller-supplied `PROFILE` keyword is overridden by the process profile.
///
/// # Errors
///
/// Returns [`CallError::UnknownClass`] if `request.classname` is not registered.
pub fn resolve(
    registry: &ClassRegistry,
    request: Request,
    profile: &Profile,
) -> Result<DeferredCall, CallError> {
    let Request {
        classname,
        method,
        args,
        mut kws,
        cntr,
    } = request;

    let factory = registry
        .get(&classname)
        .ok_or_else(|| CallError::UnknownClass {
            classname: classname.clone(),
        })?;

    let constructor = cntr
        .map(|cntr| Arguments::new(cntr.0, cntr.1))
        .unwrap_or_default();
    kws.insert(Profile::KEYWORD.to_string(), profile.to_value());

    debug!(%classname, %method, "resolved call");
    Ok(DeferredCall {
        classname,
        method,
        factory,
        constructor,
        arguments: Arguments::new(args, kws),
    })
}

impl DeferredCall {
    /// `Class.method`, for logs and traces.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}.{}", self.classname, self.method)
    }

    #[must_use]
    pub fn constructor(&self) -> &Arguments {
        &self.constructor
    }

    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Constructs the instance and invokes the method.
    ///
    /// # Errors
    ///
    /// - [`CallError::Application`] if construction or the method itself fails.
    /// - [`CallError::UnknownMethod`] if the instance does not respond to the method.
    pub async fn execute(self) -> Result<Value, CallError> {
        let instance = self
            .factory
            .construct(self.constructor)
            .map_err(CallError::Application)?;
        if !instance.responds_to(&self.method) {
            return Err(CallError::UnknownMethod {
                classname: self.classname,
                method: self.method,
            });
        }
        instance
            .invoke(&self.method, self.arguments)
            .await
            .map_err(CallError::Application)
    }
}

impl std::fmt::Debug for DeferredCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredCall")
            .field("target", &self.target())
            .field("constructor", &self.constructor)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

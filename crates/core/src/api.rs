//! Method-path builders
//!
//! `api.method("users").extend("get")` names the remote method
//! `users.get`; segments are joined with `.` left to right, so any split
//! of a dotted name builds the same method. The reserved `timeout`
//! argument is taken out of the arguments and used as the call timeout.
//!
//! [`Api`] performs the call when invoked. [`LazyApi`] returns a
//! [`DeferredCall`] instead, letting callers build many calls up front and
//! schedule them later (for example with `futures::future::join_all`).

use std::future::IntoFuture;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use vkrelay_domain::{Call, Params, Result};

use crate::session::Session;

/// Eager method builder
#[derive(Debug, Clone)]
pub struct Api {
    session: Arc<Session>,
}

impl Api {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Start a method path with its first segment
    pub fn method(&self, segment: impl Into<String>) -> Method {
        Method { session: Arc::clone(&self.session), segments: vec![segment.into()] }
    }

    /// Call a method by its full dotted name
    pub async fn call(&self, method: &str, arguments: Params) -> Result<Value> {
        self.method(method).invoke(arguments).await
    }
}

/// A method path bound to a session, ready to be invoked
#[derive(Debug, Clone)]
pub struct Method {
    session: Arc<Session>,
    segments: Vec<String>,
}

impl Method {
    /// Append a path segment
    pub fn extend(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Dotted method name
    pub fn name(&self) -> String {
        self.segments.join(".")
    }

    /// Perform the call.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed `timeout` argument, otherwise
    /// whatever [`Session::send`] returns.
    pub async fn invoke(&self, arguments: Params) -> Result<Value> {
        let call = Call::from_arguments(self.name(), arguments)?;
        self.session.send(&call.method, call.arguments, call.timeout).await
    }
}

/// Lazy method builder
#[derive(Debug, Clone)]
pub struct LazyApi {
    session: Arc<Session>,
}

impl LazyApi {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn method(&self, segment: impl Into<String>) -> LazyMethod {
        LazyMethod { session: Arc::clone(&self.session), segments: vec![segment.into()] }
    }

    /// Deferred call of a method by its full dotted name
    pub fn call(&self, method: &str, arguments: Params) -> Result<DeferredCall> {
        self.method(method).invoke(arguments)
    }
}

#[derive(Debug, Clone)]
pub struct LazyMethod {
    session: Arc<Session>,
    segments: Vec<String>,
}

impl LazyMethod {
    pub fn extend(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn name(&self) -> String {
        self.segments.join(".")
    }

    /// Fix the arguments without sending anything.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed `timeout` argument.
    pub fn invoke(&self, arguments: Params) -> Result<DeferredCall> {
        let call = Call::from_arguments(self.name(), arguments)?;
        Ok(DeferredCall { session: Arc::clone(&self.session), call })
    }
}

/// A fully specified call that runs only when asked to
#[derive(Debug, Clone)]
pub struct DeferredCall {
    session: Arc<Session>,
    call: Call,
}

impl DeferredCall {
    pub fn call(&self) -> &Call {
        &self.call
    }

    /// Perform the call
    pub async fn run(&self) -> Result<Value> {
        self.session
            .send(&self.call.method, self.call.arguments.clone(), self.call.timeout)
            .await
    }
}

impl IntoFuture for DeferredCall {
    type Output = Result<Value>;
    type IntoFuture = BoxFuture<'static, Result<Value>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.run().await })
    }
}

use async_trait::async_trait;
use serde::Deserialize;

use super::lowercase_all;
use crate::error::MiddlewareError;
use crate::pipeline::MiddlewareSpec;
use crate::traits::{Middleware, MiddlewareContext, MiddlewareOutcome};

#[derive(Debug, Deserialize)]
struct UserListParams {
    #[serde(default)]
    users: Vec<String>,
}

/// Whether the sender's `uniqueId` or `nickname` is listed, ignoring case.
fn sender_listed(spec: &MiddlewareSpec, ctx: &MiddlewareContext) -> Result<bool, MiddlewareError> {
    let params: UserListParams = spec.params()?;
    let listed = lowercase_all(&params.users);
    let candidates = [ctx.data.unique_id.as_deref(), ctx.data.nickname.as_deref()];
    Ok(candidates
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .any(|name| listed.contains(&name)))
}

/// Blocks events from listed users.
pub struct BlockUser;

#[async_trait]
impl Middleware for BlockUser {
    async fn handle(
        &self,
        spec: &MiddlewareSpec,
        ctx: &MiddlewareContext,
    ) -> Result<MiddlewareOutcome, MiddlewareError> {
        if sender_listed(spec, ctx)? {
            return Ok(MiddlewareOutcome::block("user is blocked"));
        }
        Ok(MiddlewareOutcome::pass())
    }
}

/// Lets listed users through and skips the remaining chain.
pub struct Whitelist;

#[async_trait]
impl Middleware for Whitelist {
    async fn handle(
        &self,
        spec: &MiddlewareSpec,
        ctx: &MiddlewareContext,
    ) -> Result<MiddlewareOutcome, MiddlewareError> {
        if sender_listed(spec, ctx)? {
            return Ok(MiddlewareOutcome::force_pass("user is whitelisted"));
        }
        Ok(MiddlewareOutcome::pass())
    }
}

//! Login/logout command handlers.

use anyhow::{Context, Result};
use backoffice_core::identity::IdentityProvider;
use backoffice_core::session::{Clock, Session, SystemClock};

use super::AppContext;

pub fn login(
    ctx: &AppContext,
    access_token: String,
    refresh_token: String,
    expires_in: u64,
) -> Result<()> {
    let access_token = access_token.trim().to_string();
    let refresh_token = refresh_token.trim().to_string();
    if access_token.is_empty() || refresh_token.is_empty() {
        anyhow::bail!("Both --access-token and --refresh-token are required");
    }

    let expires_at = SystemClock.now_secs().saturating_add(expires_in);
    let session = Session::new(access_token, refresh_token, expires_at);

    ctx.vault.store_session(&session).context("store tokens")?;
    ctx.provider.sign_in(session).context("store session")?;

    println!("Logged in (session expires {})", super::status::format_expiry(expires_at));
    Ok(())
}

pub async fn logout(ctx: &AppContext) -> Result<()> {
    let had_session = ctx.provider.load().ok().flatten().is_some();
    let had_tokens = !ctx.vault.current().is_empty();

    ctx.provider.sign_out().await.context("sign out")?;
    ctx.vault.clear().context("clear tokens")?;

    if had_session || had_tokens {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

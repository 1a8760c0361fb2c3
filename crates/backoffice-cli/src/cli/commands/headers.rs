//! Header preview command.

use backoffice_core::auth::HeaderFlags;
use backoffice_core::logging::mask_token;
use reqwest::header::{AUTHORIZATION, HeaderMap};

use super::AppContext;

pub fn show(ctx: &AppContext, flags: HeaderFlags) {
    let headers = ctx.headers.build(HeaderMap::new(), flags);
    if headers.is_empty() {
        println!("No headers attached");
        return;
    }

    for (name, value) in &headers {
        let raw = value.to_str().unwrap_or_default();
        let shown = if *name == AUTHORIZATION {
            raw.strip_prefix("Bearer ").map_or_else(
                || mask_token(raw),
                |token| format!("Bearer {}", mask_token(token)),
            )
        } else {
            mask_token(raw)
        };
        println!("{name}: {shown}");
    }
}

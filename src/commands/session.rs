use colored::Colorize;

use crate::auth::claims::decode_claims;
use crate::auth::session::Role;
use crate::client::ApiClient;
use crate::error::Result;

/// Sign in and report where the account lands.
pub async fn sign_in(client: &ApiClient, role: &str, email: &str, password: &str) -> Result<()> {
    let granted = client.sign_in(role, email, password).await?;

    println!("{}", "Login successful!".green());
    match granted.as_deref().map(|claim| (claim, Role::from_claim(claim))) {
        Some((_, Some(role))) => {
            println!("Role: {}", role.to_string().cyan());
            println!("Landing page: {}", role.landing_path());
        }
        Some((claim, None)) => {
            println!("Role: {} {}", claim.cyan(), "(unrecognized)".yellow());
            println!("Landing page: /");
        }
        None => println!("Landing page: /"),
    }
    Ok(())
}

/// Forget stored credentials.
pub fn sign_out(client: &ApiClient) -> Result<()> {
    client.sign_out()?;
    println!("{}", "Signed out.".green());
    Ok(())
}

/// Print whether a usable session is stored.
pub fn status(client: &ApiClient) -> Result<()> {
    let session = client.session();

    let Some(token) = session.access_token()? else {
        println!("{}", "Not signed in.".yellow());
        return Ok(());
    };

    if client.is_authenticated() {
        println!("{}", "Signed in.".green());
    } else if session.refresh_token()?.is_some() {
        println!(
            "{}",
            "Access token expired; it will be refreshed on the next request.".yellow()
        );
    } else {
        println!("{}", "Session expired. Sign in again.".red());
    }

    if let Some(role) = session.role()? {
        println!("Role: {}", role.cyan());
    }

    match decode_claims(&token).and_then(|claims| claims.expires_at()) {
        Ok(expires_at) => println!("Access token expires: {}", expires_at.to_rfc3339()),
        Err(e) => println!("Access token expiry unreadable: {}", e),
    }

    Ok(())
}

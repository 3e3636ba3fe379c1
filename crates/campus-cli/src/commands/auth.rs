//! Auth commands: login, register, logout, whoami.

use anyhow::Result;
use colored::Colorize;

use campus_client::Session;
use campus_core::{Credentials, Role, User};

pub async fn login(session: &Session, email: String, password: String) -> Result<()> {
    let user = session.login(&Credentials::new(email, password)).await?;
    print_user("Logged in as", &user);
    Ok(())
}

pub async fn register(
    session: &Session,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    role: Role,
) -> Result<()> {
    let user = session
        .register(
            &Credentials::new(email, password),
            &first_name,
            &last_name,
            role,
        )
        .await?;
    print_user("Registered as", &user);
    Ok(())
}

pub async fn logout(session: &Session) -> Result<()> {
    session.logout().await;
    println!("{}", "Logged out".green());
    Ok(())
}

pub async fn whoami(session: &Session) -> Result<()> {
    match session.current_user().await {
        Some(user) => print_user("Logged in as", &user),
        None => println!("{}", "Not logged in".yellow()),
    }
    Ok(())
}

fn print_user(prefix: &str, user: &User) {
    println!(
        "{} {} <{}> ({})",
        prefix.green(),
        user.display_name().bold(),
        user.email,
        user.role
    );
}

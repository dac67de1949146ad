use crate::{
    cli::actions::navigate::describe,
    console::{AppConfig, Console, Credential, RegistrationForm},
};
use anyhow::Result;

#[derive(Debug)]
pub struct Args {
    pub config: AppConfig,
}

#[derive(Debug)]
pub struct LoginArgs {
    pub config: AppConfig,
    pub credential: Credential,
    pub return_to: Option<String>,
}

#[derive(Debug)]
pub struct RegisterArgs {
    pub config: AppConfig,
    pub form: RegistrationForm,
}

/// Sign in and store the session.
/// # Errors
/// Returns an error if the credential is rejected or the service is unreachable.
pub async fn login(args: LoginArgs) -> Result<()> {
    let mut console = Console::bootstrap(&args.config)?;

    let screen = console.login(&args.credential).await?;
    let screen = match args.return_to.as_deref() {
        Some(location) => console.navigate(location),
        None => screen,
    };

    if let Some(user) = console.user() {
        println!("Signed in as {} ({})", user.username, user.role);
    }
    println!("{}", describe(&console, &screen));

    Ok(())
}

/// # Errors
/// Returns an error if the console cannot be initialized.
pub fn logout(args: &Args) -> Result<()> {
    let mut console = Console::bootstrap(&args.config)?;
    let was_signed_in = console.context().is_authenticated();
    console.logout();

    if was_signed_in {
        println!("Signed out");
    } else {
        println!("Not signed in");
    }

    Ok(())
}

/// Print the stored identity and the screens its role may open.
/// # Errors
/// Returns an error if the console cannot be initialized.
pub fn status(args: &Args) -> Result<()> {
    let console = Console::bootstrap(&args.config)?;

    let Some(user) = console.user() else {
        println!("Not signed in");
        return Ok(());
    };

    println!("Signed in as {} ({})", user.username, user.role);
    for rule in console.navigation() {
        println!("  {:<12} {}", rule.path, rule.label);
    }

    Ok(())
}

/// # Errors
/// Returns an error if the form is invalid or the service refuses it.
pub async fn register(args: RegisterArgs) -> Result<()> {
    let mut console = Console::bootstrap(&args.config)?;
    let receipt = console.register(&args.form).await?;

    println!("{}", receipt.message);

    Ok(())
}

use clap::{Arg, ArgAction, Command};

pub const CMD_LOGIN: &str = "login";
pub const CMD_LOGOUT: &str = "logout";
pub const CMD_STATUS: &str = "status";
pub const CMD_REGISTER: &str = "register";
pub const CMD_OPEN: &str = "open";
pub const CMD_REQUEST: &str = "request";

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(login())
        .subcommand(Command::new(CMD_LOGOUT).about("Forget the stored session"))
        .subcommand(Command::new(CMD_STATUS).about("Show the signed-in identity and its screens"))
        .subcommand(register())
        .subcommand(
            Command::new(CMD_OPEN)
                .about("Open a console screen and load its listing")
                .arg(
                    Arg::new("location")
                        .help("Screen location, for example /stocks or /reports?month=2024-05")
                        .required(true),
                ),
        )
        .subcommand(request())
}

fn login() -> Command {
    Command::new(CMD_LOGIN)
        .about("Sign in and store the session")
        .arg(
            Arg::new("username")
                .short('u')
                .long("username")
                .help("Account username")
                .env("GES_USERNAME")
                .required(true),
        )
        .arg(
            Arg::new("password")
                .short('p')
                .long("password")
                .help("Account password")
                .env("GES_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("return-to")
                .long("return-to")
                .help("Screen to open after signing in"),
        )
}

fn register() -> Command {
    Command::new(CMD_REGISTER)
        .about("Create a STAFF or MANAGER account")
        .arg(
            Arg::new("username")
                .short('u')
                .long("username")
                .help("Account username, 3 to 20 characters")
                .required(true),
        )
        .arg(
            Arg::new("password")
                .short('p')
                .long("password")
                .help("At least 6 characters with upper case, lower case and a digit")
                .env("GES_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("confirm-password")
                .long("confirm-password")
                .help("Repeat the password")
                .required(true),
        )
        .arg(
            Arg::new("full-name")
                .long("full-name")
                .help("Display name")
                .required(true),
        )
        .arg(
            Arg::new("role")
                .long("role")
                .help("Requested role")
                .default_value("STAFF"),
        )
}

fn request() -> Command {
    Command::new(CMD_REQUEST)
        .about("Send an authenticated call to the service")
        .arg(
            Arg::new("method")
                .help("HTTP method")
                .required(true)
                .value_parser(["GET", "POST", "PUT", "PATCH", "DELETE"])
                .ignore_case(true),
        )
        .arg(
            Arg::new("path")
                .help("Path below the API base URL, for example /stocks/1")
                .required(true),
        )
        .arg(
            Arg::new("data")
                .short('d')
                .long("data")
                .help("JSON request body")
                .action(ArgAction::Set),
        )
}

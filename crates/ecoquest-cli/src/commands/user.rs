use clap::Subcommand;
use ecoquest_core::{Config, NewUser};

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum UserAction {
    /// Register a new user
    Register {
        /// Display name
        name: String,
        /// Email address (unique, case-insensitive)
        email: String,
        /// Avatar URL
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Show a user's profile and point total
    Show {
        /// User ID
        user_id: String,
    },
}

pub fn run(action: UserAction, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(config)?;

    match action {
        UserAction::Register {
            name,
            email,
            avatar,
        } => {
            let mut new = NewUser::new(name, email);
            if let Some(avatar) = avatar {
                new = new.with_avatar(avatar);
            }
            print_json(&engine.register_user(new)?)?;
        }
        UserAction::Show { user_id } => {
            print_json(&engine.get_user(&user_id)?)?;
        }
    }
    Ok(())
}

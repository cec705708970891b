use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use client::{ChatApi, HttpApi};
use shared::{config::ClientConfig, models::Identity};

use super::session::require_credential;

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Show a user's avatar and bio (defaults to yourself)
    Show {
        /// Username to look up
        username: Option<String>,
    },
    /// Replace your bio
    Bio {
        /// New bio text
        text: String,
    },
    /// Upload a new avatar image
    Avatar {
        /// Image file to upload
        path: PathBuf,
    },
}

pub async fn handle(config: &ClientConfig, command: ProfileCommand) -> Result<()> {
    let credential = require_credential()?;
    let api = HttpApi::from_config(config)?;

    match command {
        ProfileCommand::Show { username } => {
            let username = username.map_or_else(|| credential.username.clone(), Identity::from);
            let profile = api
                .fetch_profile(&credential, &username)
                .await
                .with_context(|| format!("failed to fetch profile for {username}"))?;
            println!("user:   {username}");
            let avatar = profile.avatar();
            println!(
                "avatar: {}",
                if avatar.is_empty() { "(none)" } else { avatar.as_str() }
            );
            println!("bio:    {}", profile.bio.as_deref().unwrap_or("(none)"));
        }
        ProfileCommand::Bio { text } => {
            api.update_bio(&credential, &credential.username, &text)
                .await
                .context("failed to update bio")?;
            println!("Bio updated.");
        }
        ProfileCommand::Avatar { path } => {
            let url = api
                .upload_avatar(&credential, &credential.username, &path)
                .await
                .context("failed to upload avatar")?;
            println!("Avatar uploaded: {url}");
        }
    }

    Ok(())
}

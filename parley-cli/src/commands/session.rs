use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::Args;
use client::{HttpApi, SessionError};
use directories::BaseDirs;
use rpassword::prompt_password;
use shared::{config::ClientConfig, models::Credential};

/// Overrides where the credential file lives.
pub const CREDENTIALS_ENV: &str = "PARLEY_CREDENTIALS";

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Username to log in as; prompted for when omitted
    #[arg(long, short)]
    pub username: Option<String>,
}

#[derive(Args, Debug)]
pub struct SignupArgs {
    /// Username to register; prompted for when omitted
    #[arg(long, short)]
    pub username: Option<String>,
}

pub async fn login(config: &ClientConfig, args: LoginArgs) -> Result<()> {
    let username = match args.username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("password must not be empty");
    }

    let api = HttpApi::from_config(config)?;
    let credential = match api.authenticate(&username, &password).await {
        Ok(credential) => credential,
        Err(SessionError::InvalidCredentials) => bail!("login failed: invalid username or password"),
        Err(err) => return Err(err).context("login request failed"),
    };

    let path = credentials_path();
    save_credential(&path, &credential)?;
    println!("Logged in as {}", credential.username);
    println!("credential stored at {}", path.display());
    Ok(())
}

pub async fn signup(config: &ClientConfig, args: SignupArgs) -> Result<()> {
    let username = match args.username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = prompt_password("Password: ")?;
    let confirm = prompt_password("Confirm password: ")?;
    if password.is_empty() {
        bail!("password must not be empty");
    }
    if password != confirm {
        bail!("passwords do not match");
    }

    let api = HttpApi::from_config(config)?;
    match api.signup(&username, &password).await {
        Ok(created) => {
            println!("{} (id {})", created.message, created.id);
            println!("run `parley login -u {}` to sign in", created.username);
            Ok(())
        }
        Err(SessionError::UsernameTaken) => bail!("username `{username}` is already taken"),
        Err(err) => Err(err).context("signup request failed"),
    }
}

pub fn logout() -> Result<()> {
    let path = credentials_path();
    if path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove credential file {}", path.display()))?;
        println!("Removed stored credential at {}", path.display());
    } else {
        println!("No stored credential found at {}", path.display());
    }
    Ok(())
}

pub fn credentials_path() -> PathBuf {
    if let Some(path) = env::var_os(CREDENTIALS_ENV) {
        return PathBuf::from(path);
    }
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("parley").join("credentials.toml"))
        .unwrap_or_else(|| PathBuf::from("./credentials.toml"))
}

/// The stored credential, if there is one.
pub fn load_credential(path: &Path) -> Result<Option<Credential>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read credential file {}", path.display()))?;
    let credential = toml::from_str(&contents)
        .with_context(|| format!("credential file {} is corrupt", path.display()))?;
    Ok(Some(credential))
}

/// The stored credential, or an error telling the user to log in.
pub fn require_credential() -> Result<Credential> {
    let path = credentials_path();
    load_credential(&path)?.with_context(|| {
        format!(
            "no credential found at {}; run `parley login` first",
            path.display()
        )
    })
}

pub fn save_credential(path: &Path, credential: &Credential) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let contents = toml::to_string(credential).context("failed to serialize credential")?;
    fs::write(path, contents)
        .with_context(|| format!("failed to write credential file {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .context("failed to set credential file permissions")?;
    }
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush().ok();
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim().to_string();
    if trimmed.is_empty() {
        bail!("input must not be empty");
    }
    Ok(trimmed)
}

//! Interactive prompts

use std::io::{self, Write};
use vpnshell_core::error::VpnShellError;

/// Prompt until a non-empty value is entered
pub fn prompt_required(prompt: &str) -> Result<String, VpnShellError> {
    loop {
        let input = prompt_input(&format!("{}: ", prompt))?;

        if input.trim().is_empty() {
            println!("❌ This field is required. Please enter a value.");
            continue;
        }

        return Ok(input.trim().to_string());
    }
}

/// Prompt for a password
///
/// Surrounding whitespace is kept since it may be part of the password.
pub fn prompt_password(prompt: &str) -> Result<String, VpnShellError> {
    loop {
        let input = prompt_input(&format!("{}: ", prompt))?;

        if input.is_empty() {
            println!("❌ Password cannot be empty. Please try again.");
            continue;
        }

        return Ok(input);
    }
}

/// Low-level input prompting
fn prompt_input(prompt: &str) -> Result<String, VpnShellError> {
    print!("{}", prompt);
    io::stdout().flush().map_err(VpnShellError::Io)?;

    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).map_err(VpnShellError::Io)?;
    if read == 0 {
        return Err(VpnShellError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed while prompting",
        )));
    }

    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

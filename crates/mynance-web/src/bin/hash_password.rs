//! Prints an argon2 hash for the `[[accounts]]` section of the authority config.

use std::io::{self, Write};

use mynance_core::password;

fn main() -> anyhow::Result<()> {
    eprint!("Enter password: ");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim_end_matches(['\r', '\n']);

    if input.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    if !password::is_strong_password(input) {
        eprintln!(
            "warning: password does not meet the complexity rules \
             (8+ chars, upper, lower, digit, symbol)"
        );
    }

    println!("{}", password::hash_password(input)?);
    Ok(())
}

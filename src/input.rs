//! Operator input: positional fallbacks, validation and the write-blocker
//! confirmation. Readers and writers are injected so the prompts can be
//! driven from tests.

use anyhow::{anyhow, bail, Context, Result};
use std::io::{BufRead, Write};

/// Returns `given` if present, otherwise asks for it on `input`.
pub fn value_or_prompt<R: BufRead, W: Write>(
    given: Option<String>,
    label: &str,
    input: &mut R,
    out: &mut W,
) -> Result<String> {
    if let Some(v) = given {
        return Ok(v);
    }
    write!(out, "{label}: ")?;
    out.flush()?;
    let mut line = String::new();
    let n = input
        .read_line(&mut line)
        .with_context(|| format!("reading {label}"))?;
    if n == 0 {
        return Err(anyhow!("no {label} given (end of input)"));
    }
    Ok(line.trim().to_string())
}

pub fn validate_device_path(device: &str, required_prefix: &str) -> Result<()> {
    if !device.starts_with(required_prefix) {
        bail!("Invalid device path: {device} (must start with {required_prefix})");
    }
    if device.len() == required_prefix.len() {
        bail!("Invalid device path: {device} (no device name)");
    }
    Ok(())
}

/// Trims and rejects an empty case identifier.
pub fn validate_case_id(case_id: &str) -> Result<String> {
    let trimmed = case_id.trim();
    if trimmed.is_empty() {
        bail!("Case identifier must not be empty");
    }
    Ok(trimmed.to_string())
}

/// Asks the operator to affirm a write-blocker is in place. Only `yes` or `y`
/// (any case) count as confirmation; end of input counts as a refusal.
pub fn confirm_write_blocker<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<bool> {
    writeln!(out, "CRITICAL: Hardware write-blocker must be connected.")?;
    writeln!(
        out,
        "Verify: write-blocker powered, LED shows PROTECTED, device connected through it."
    )?;
    write!(out, "\nConfirm write-blocker is active [yes/NO]: ")?;
    out.flush()?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .with_context(|| "reading write-blocker confirmation")?;
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer == "yes" || answer == "y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_blocker_answers() {
        for (answer, expected) in [
            ("yes\n", true),
            ("Y\n", true),
            (" YES \n", true),
            ("no\n", false),
            ("\n", false),
            ("yep\n", false),
            ("", false),
        ] {
            let mut out = Vec::new();
            let got = confirm_write_blocker(&mut Cursor::new(answer), &mut out).unwrap();
            assert_eq!(got, expected, "answer {answer:?}");
        }
    }

    #[test]
    fn prompts_only_when_missing() {
        let mut out = Vec::new();
        let v = value_or_prompt(Some("/dev/sdb".into()), "Device", &mut Cursor::new(""), &mut out)
            .unwrap();
        assert_eq!(v, "/dev/sdb");
        assert!(out.is_empty());

        let v = value_or_prompt(None, "Case ID", &mut Cursor::new("  CASE-7 \n"), &mut out).unwrap();
        assert_eq!(v, "CASE-7");
        assert_eq!(String::from_utf8(out).unwrap(), "Case ID: ");
    }

    #[test]
    fn prompt_at_eof_is_an_error() {
        let mut out = Vec::new();
        assert!(value_or_prompt(None, "Device", &mut Cursor::new(""), &mut out).is_err());
    }
}

//! Command-line options.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

pub const USAGE: &str =
    "usage: pitchtrack [--config FILE] [--input FILE.pcm] [--history-out FILE.json] [--gain G]";

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// JSON analyzer configuration; defaults apply when absent.
    pub config: Option<PathBuf>,
    /// Raw s16le mono PCM. Live capture is used when absent.
    pub input: Option<PathBuf>,
    pub history_out: Option<PathBuf>,
    pub gain: f32,
}

impl Default for Options {
    fn default() -> Self {
        Self { config: None, input: None, history_out: None, gain: 1.0 }
    }
}

impl Options {
    /// Parses the arguments following the program name.
    /// Returns `Ok(None)` when help was requested.
    pub fn parse<I>(args: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Options::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = || args.next().with_context(|| format!("{arg} needs a value"));
            match arg.as_str() {
                "--config" => options.config = Some(value()?.into()),
                "--input" => options.input = Some(value()?.into()),
                "--history-out" => options.history_out = Some(value()?.into()),
                "--gain" => {
                    let raw = value()?;
                    options.gain = raw.parse().with_context(|| format!("invalid gain {raw:?}"))?;
                    if !options.gain.is_finite() || options.gain <= 0.0 {
                        bail!("gain must be a positive number");
                    }
                }
                "-h" | "--help" => return Ok(None),
                other => bail!("unknown argument {other:?}\n{USAGE}"),
            }
        }

        Ok(Some(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Options>> {
        Options::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults() {
        assert_eq!(parse(&[]).unwrap(), Some(Options::default()));
    }

    #[test]
    fn test_all_flags() {
        let options = parse(&[
            "--config", "tracker.json", "--input", "take.pcm", "--history-out", "history.json", "--gain", "2.5",
        ])
        .unwrap()
        .unwrap();
        assert_eq!(options.config, Some(PathBuf::from("tracker.json")));
        assert_eq!(options.input, Some(PathBuf::from("take.pcm")));
        assert_eq!(options.history_out, Some(PathBuf::from("history.json")));
        assert_eq!(options.gain, 2.5);
    }

    #[test]
    fn test_help() {
        assert_eq!(parse(&["--help"]).unwrap(), None);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse(&["--input"]).is_err());
        assert!(parse(&["--gain", "loud"]).is_err());
        assert!(parse(&["--gain", "-1"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }
}

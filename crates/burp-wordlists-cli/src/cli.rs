//! Command-line definition.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "burp-wordlists")]
#[command(about = "Build wordlists from Burp Suite HTTP history exports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory the .pay wordlists are written to (created if missing)
    pub output_dir: PathBuf,

    /// Burp XML exports to read
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positionals() {
        let cli = Cli::try_parse_from(["burp-wordlists", "out", "a.xml", "b.xml"]).unwrap();
        assert_eq!(cli.output_dir, PathBuf::from("out"));
        assert_eq!(cli.inputs, vec![PathBuf::from("a.xml"), PathBuf::from("b.xml")]);
    }

    #[test]
    fn test_inputs_required() {
        assert!(Cli::try_parse_from(["burp-wordlists", "out"]).is_err());
        assert!(Cli::try_parse_from(["burp-wordlists"]).is_err());
    }

    #[test]
    fn test_no_flags() {
        assert!(Cli::try_parse_from(["burp-wordlists", "--json", "out", "a.xml"]).is_err());
    }
}

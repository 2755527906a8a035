//! Interface de linha de comando do storybatch baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, demo, presets)
//! e flags globais (--config, --preset, --max-concurrency, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_CONFIG_PATH, Preset};

/// storybatch: processador resiliente de lotes de análise de histórias.
#[derive(Debug, Parser)]
#[command(name = "storybatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração TOML.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Preset base (high_throughput, high_quality, balanced); substitui o do arquivo.
    #[arg(long, global = true)]
    pub preset: Option<Preset>,

    /// Tamanho máximo de cada grupo concorrente.
    #[arg(long, global = true)]
    pub max_concurrency: Option<usize>,

    /// Imprime o resumo em JSON em vez do formato colorido.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emite os logs em JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Processa os jobs de um arquivo JSON ou TOML com o analisador simulado.
    Run {
        /// Caminho para o arquivo com as definições de job.
        #[arg(long)]
        file: PathBuf,
    },

    /// Executa um lote sintético com falhas injetadas.
    Demo {
        /// Número de histórias geradas.
        #[arg(long, default_value_t = 20)]
        jobs: usize,
    },

    /// Lista os presets de configuração.
    Presets,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["storybatch", "run", "--file", "stories.json"]);
        match cli.command {
            Command::Run { file } => assert_eq!(file, PathBuf::from("stories.json")),
            _ => panic!("expected Run command"),
        }
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "storybatch",
            "--preset",
            "high-quality",
            "--max-concurrency",
            "4",
            "--json",
            "--verbose",
            "demo",
            "--jobs",
            "7",
        ]);
        assert!(cli.verbose);
        assert!(cli.json);
        assert_eq!(cli.preset, Some(Preset::HighQuality));
        assert_eq!(cli.max_concurrency, Some(4));
        assert!(matches!(cli.command, Command::Demo { jobs: 7 }));
    }

    #[test]
    fn cli_rejects_unknown_preset() {
        assert!(Cli::try_parse_from(["storybatch", "--preset", "fastest", "presets"]).is_err());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}

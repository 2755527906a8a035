//! Interface de terminal do storybatch: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`BatchProgress`] acompanha visualmente
//! a execução de um lote no terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::classifier::ErrorCategory;
use crate::config::Preset;
use crate::job::{Job, SkipReason};
use crate::observer::BatchObserver;
use crate::summary::BatchSummary;

/// Indicador visual de progresso para a execução de um lote no terminal.
///
/// Exibe uma barra com um tique por job terminado e mensagens
/// coloridas para falha (vermelho), retentativa (amarelo) e pulo (cinza).
pub struct BatchProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl BatchProgress {
    /// Inicia a barra com o total de jobs do lote.
    pub fn start(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl BatchObserver for BatchProgress {
    fn on_group_start(&self, group: usize, total_groups: usize, size: usize) {
        self.pb.set_message(format!("group {group}/{total_groups} ({size} jobs)"));
    }

    fn on_retry(&self, job: &Job, attempt: u32, category: ErrorCategory, delay: Duration) {
        self.pb.println(format!(
            "  {} {} attempt {attempt} failed ({category}), retrying in {}ms",
            self.yellow.apply_to("↻"),
            job.title,
            delay.as_millis()
        ));
    }

    fn on_job_finished(&self, job: &Job, outcome: &'static str, _duration: Duration) {
        if outcome != "success" {
            self.pb.println(format!("  {} {} {outcome}", self.red.apply_to("✗"), job.title));
        }
        self.pb.inc(1);
    }

    fn on_skipped(&self, job: &Job, reason: SkipReason) {
        self.pb
            .println(format!("  {} {} skipped: {reason}", self.dim.apply_to("–"), job.title));
        self.pb.inc(1);
    }

    fn on_early_stop(&self, failure_rate: f64, remaining: usize) {
        self.pb.println(format!(
            "  {} failure rate {:.0}% above limit, skipping {remaining} jobs",
            self.red.apply_to("⚠"),
            failure_rate * 100.0
        ));
    }
}

/// Imprime o resumo do lote com estilo colorido.
pub fn print_summary(summary: &BatchSummary) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();
    let m = &summary.metrics;
    let a = &summary.assessment;

    println!();
    println!("─── Batch Summary ───");
    println!(
        "  jobs: {}  success: {}  failed: {}  timed out: {}  skipped: {}",
        m.total_jobs, m.successful, m.failed, m.timed_out, m.skipped
    );
    println!(
        "  success rate: {:.1}%  timeout rate: {:.1}%  retry rate: {:.1}%",
        m.success_rate * 100.0,
        m.timeout_rate * 100.0,
        m.retry_rate * 100.0
    );
    println!(
        "  total: {:.2}s  mean job: {}ms  p95 job: {}ms",
        m.total_time.as_secs_f64(),
        m.mean_job_time.as_millis(),
        m.p95_job_time.as_millis()
    );
    if !m.error_distribution.is_empty() {
        let errors: Vec<String> = m
            .error_distribution
            .iter()
            .map(|(category, count)| format!("{category}={count}"))
            .collect();
        println!("  errors: {}", errors.join(", "));
    }

    println!();
    if a.acceptable {
        println!("  {} Batch accepted", green.apply_to("✓"));
    } else {
        println!("  {} Batch flagged by quality gate", red.apply_to("✗"));
    }
    for rec in &a.recommendations {
        println!("  {} {rec}", yellow.apply_to("•"));
    }
}

/// Imprime a tabela de presets disponíveis.
pub fn print_presets() {
    let bold = Style::new().bold();
    for preset in Preset::ALL {
        let c = preset.config();
        println!("{}", bold.apply_to(preset));
        println!(
            "  item_timeout_ms={} batch_timeout_ms={} max_concurrency={} max_failure_rate={} min_success_count={}",
            c.item_timeout_ms, c.batch_timeout_ms, c.max_concurrency, c.max_failure_rate, c.min_success_count
        );
        println!(
            "  retry: max_retries={} timeout_retries={} retry_delay_ms={}",
            c.retry.max_retries, c.retry.timeout_retries, c.retry.retry_delay_ms
        );
    }
}

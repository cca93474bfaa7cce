//! Progress reporting for orchestration runs

use colored::Colorize;
use conductor_application::OrchestrationProgress;
use conductor_domain::{ExecutionPlan, PlanStep, Review, ReviewStatus, StepId};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Reports progress with one spinner per running step
pub struct ProgressReporter {
    multi: MultiProgress,
    steps: Mutex<HashMap<StepId, ProgressBar>>,
    iteration_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            steps: Mutex::new(HashMap::new()),
            iteration_bar: Mutex::new(None),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn spinner(&self, prefix: String, message: String) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(prefix);
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn step_prefix(step: &PlanStep) -> String {
    format!("Step {} [{}]", step.id(), step.role())
}

fn objective_preview(objective: &str) -> String {
    let line = objective.lines().next().unwrap_or_default();
    if line.chars().count() > 60 {
        format!("{}...", line.chars().take(57).collect::<String>())
    } else {
        line.to_string()
    }
}

fn status_label(review: &Review) -> colored::ColoredString {
    match review.status() {
        ReviewStatus::Converged => review.status().as_str().green().bold(),
        ReviewStatus::Open => review.status().as_str().yellow().bold(),
        _ => review.status().as_str().red().bold(),
    }
}

impl OrchestrationProgress for ProgressReporter {
    fn on_run_start(&self, task: &str) {
        let _ = self.multi.println(format!(
            "{} {}",
            "Task:".cyan().bold(),
            objective_preview(task)
        ));
    }

    fn on_plan_rejected(&self, attempt: usize, message: &str) {
        let _ = self.multi.println(format!(
            "  {} plan attempt {} rejected: {}",
            "!".yellow(),
            attempt,
            message
        ));
    }

    fn on_plan_ready(&self, plan: &ExecutionPlan) {
        let _ = self.multi.println(format!(
            "{} {} step(s), up to {} iteration(s)",
            "Plan:".cyan().bold(),
            plan.steps().len(),
            plan.iteration_strategy().max_iterations()
        ));
    }

    fn on_step_start(&self, step: &PlanStep) {
        let pb = self.spinner(step_prefix(step), objective_preview(step.objective()));
        if let Ok(mut steps) = self.steps.lock() {
            steps.insert(step.id(), pb);
        }
    }

    fn on_step_complete(&self, step: &PlanStep, success: bool) {
        let pb = self.steps.lock().ok().and_then(|mut s| s.remove(&step.id()));
        if let Some(pb) = pb {
            let mark = if success { "v".green() } else { "x".red() };
            pb.finish_with_message(format!("{} {}", mark, objective_preview(step.objective())));
        }
    }

    fn on_dependency_deadlock(&self, forced: StepId, pending: &[StepId]) {
        let pending: Vec<String> = pending.iter().map(|id| id.to_string()).collect();
        let _ = self.multi.println(format!(
            "  {} dependency deadlock among [{}]; forcing step {}",
            "!".yellow().bold(),
            pending.join(", "),
            forced
        ));
    }

    fn on_iteration_start(&self, iteration: u32, max_iterations: u32) {
        let pb = self.spinner(
            format!("Iteration {}/{}", iteration, max_iterations),
            "remediating and re-reviewing".to_string(),
        );
        if let Ok(mut bar) = self.iteration_bar.lock() {
            *bar = Some(pb);
        }
    }

    fn on_iteration_end(&self, _iteration: u32, review: &Review) {
        let pb = self.iteration_bar.lock().ok().and_then(|mut b| b.take());
        if let Some(pb) = pb {
            pb.finish_with_message(format!("{} ({})", status_label(review), review.summary_line()));
        }
    }

    fn on_run_complete(&self, review: &Review) {
        let _ = self.multi.println(format!(
            "{} {}",
            "Final review:".cyan().bold(),
            status_label(review)
        ));
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl OrchestrationProgress for SimpleProgress {
    fn on_plan_ready(&self, plan: &ExecutionPlan) {
        println!("{} plan with {} step(s)", "->".cyan(), plan.steps().len());
    }

    fn on_step_start(&self, step: &PlanStep) {
        println!("{} {}", "->".cyan(), step_prefix(step).bold());
    }

    fn on_step_complete(&self, step: &PlanStep, success: bool) {
        if success {
            println!("  {} {}", "v".green(), step_prefix(step));
        } else {
            println!("  {} {} (failed)", "x".red(), step_prefix(step));
        }
    }

    fn on_dependency_deadlock(&self, forced: StepId, _pending: &[StepId]) {
        println!("  {} dependency deadlock, forcing step {}", "!".yellow(), forced);
    }

    fn on_iteration_start(&self, iteration: u32, max_iterations: u32) {
        println!("{} iteration {}/{}", "->".cyan(), iteration, max_iterations);
    }

    fn on_iteration_end(&self, _iteration: u32, review: &Review) {
        println!("  {}", review.summary_line());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_preview_truncates_first_line() {
        assert_eq!(objective_preview("short\nsecond line"), "short");
        let long = "x".repeat(80);
        let preview = objective_preview(&long);
        assert_eq!(preview.chars().count(), 60);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_step_lifecycle_tracks_spinners() {
        let reporter = ProgressReporter::new();
        let step = PlanStep::new(
            StepId::new(1).unwrap(),
            conductor_domain::StepRole::Builder,
            "Implement the parser",
            Default::default(),
            None,
        );

        reporter.on_step_start(&step);
        assert_eq!(reporter.steps.lock().unwrap().len(), 1);
        reporter.on_step_complete(&step, true);
        assert!(reporter.steps.lock().unwrap().is_empty());

        // Completing an unknown step is a no-op.
        reporter.on_step_complete(&step, false);
    }
}

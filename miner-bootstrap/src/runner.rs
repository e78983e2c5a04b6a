use cmd_lib::CmdResult;
use log::{debug, info, warn};
use std::io::Error;

type Probe<'a> = Box<dyn Fn() -> Result<bool, Error> + 'a>;
type Action<'a> = Box<dyn Fn() -> CmdResult + 'a>;

/// A named action guarded by a probe that reports whether it is already done.
pub struct ProvisioningStep<'a> {
    name: &'static str,
    probe: Probe<'a>,
    action: Action<'a>,
}

impl<'a> ProvisioningStep<'a> {
    pub fn new(
        name: &'static str,
        probe: impl Fn() -> Result<bool, Error> + 'a,
        action: impl Fn() -> CmdResult + 'a,
    ) -> Self {
        Self {
            name,
            probe: Box::new(probe),
            action: Box::new(action),
        }
    }

    fn is_satisfied(&self) -> Result<bool, Error> {
        (self.probe)().map_err(|e| Error::other(format!("step '{}' probe failed: {e}", self.name)))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub applied: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
}

impl RunReport {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Run `steps` in order. The first failing action aborts the whole run;
/// steps that already completed are left as they are.
pub fn run_steps(steps: &[ProvisioningStep<'_>]) -> Result<RunReport, Error> {
    let mut report = RunReport::default();
    for step in steps {
        if step.is_satisfied()? {
            info!("[{}] already satisfied, skipping", step.name);
            report.skipped.push(step.name);
            continue;
        }

        info!("[{}] applying", step.name);
        (step.action)()
            .map_err(|e| Error::other(format!("step '{}' failed: {e}", step.name)))?;
        if !step.is_satisfied()? {
            warn!("[{}] still reports unsatisfied after applying", step.name);
        }
        report.applied.push(step.name);
    }
    debug!(
        "applied [{}], skipped [{}]",
        report.applied.join(", "),
        report.skipped.join(", ")
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_satisfied_steps_never_run_actions() {
        let ran = Cell::new(0);
        let steps = [
            ProvisioningStep::new("a", || Ok(true), || {
                ran.set(ran.get() + 1);
                Ok(())
            }),
            ProvisioningStep::new("b", || Ok(true), || {
                ran.set(ran.get() + 1);
                Ok(())
            }),
        ];
        let report = run_steps(&steps).unwrap();
        assert_eq!(ran.get(), 0);
        assert_eq!(report.skipped, vec!["a", "b"]);
        assert!(!report.changed());
    }

    #[test]
    fn test_unsatisfied_step_applies_once_and_becomes_satisfied() {
        let done = Cell::new(false);
        let steps = [ProvisioningStep::new(
            "install",
            || Ok(done.get()),
            || {
                done.set(true);
                Ok(())
            },
        )];
        let report = run_steps(&steps).unwrap();
        assert_eq!(report.applied, vec!["install"]);

        let report = run_steps(&steps).unwrap();
        assert_eq!(report.skipped, vec!["install"]);
        assert!(!report.changed());
    }

    #[test]
    fn test_failed_action_aborts_remaining_steps() {
        let order = RefCell::new(Vec::new());
        let steps = [
            ProvisioningStep::new("first", || Ok(false), || {
                order.borrow_mut().push("first");
                Ok(())
            }),
            ProvisioningStep::new("broken", || Ok(false), || {
                order.borrow_mut().push("broken");
                Err(Error::other("apt-get exited with status 100"))
            }),
            ProvisioningStep::new("never", || Ok(false), || {
                order.borrow_mut().push("never");
                Ok(())
            }),
        ];
        let err = run_steps(&steps).unwrap_err();
        assert_eq!(
            err.to_string(),
            "step 'broken' failed: apt-get exited with status 100"
        );
        assert_eq!(*order.borrow(), vec!["first", "broken"]);
    }

    #[test]
    fn test_probe_error_aborts() {
        let steps = [ProvisioningStep::new(
            "checkout",
            || Err(Error::other("permission denied")),
            || Ok(()),
        )];
        let err = run_steps(&steps).unwrap_err();
        assert!(err.to_string().contains("step 'checkout' probe failed"));
    }
}

use crate::{Instance, RuntimeError, Store};

/// Runs the start function of `instance`, if its module declares one.
pub(super) fn run_start(store: &mut Store, instance: Instance) -> Result<(), RuntimeError> {
    let Some(start) = instance.start(&*store) else {
        return Ok(());
    };
    log::debug!("running start function");
    start.call(store, &[])?;
    Ok(())
}

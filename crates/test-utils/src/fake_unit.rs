// crates/test-utils/src/fake_unit.rs

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use testctl::unit::{TestUnit, UnitContext, UnitFuture};

/// Shared, ordered record of what happened during a test.
#[derive(Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<JournalInner>>,
}

#[derive(Default)]
struct JournalInner {
    events: Vec<String>,
    executed: Vec<String>,
    active: usize,
    max_active: usize,
    timeouts: Vec<Duration>,
}

impl Journal {
    pub fn push(&self, event: impl Into<String>) {
        self.inner.lock().unwrap().events.push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Names of units that started executing, in order.
    pub fn executed(&self) -> Vec<String> {
        self.inner.lock().unwrap().executed.clone()
    }

    /// Highest number of units that were executing at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.inner.lock().unwrap().max_active
    }

    /// Default timeouts observed by units through their context.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.inner.lock().unwrap().timeouts.clone()
    }

    fn unit_started(&self, name: &str, ctx: &UnitContext) {
        let mut inner = self.inner.lock().unwrap();
        inner.events.push(format!("start:{}:{name}", ctx.run_id()));
        inner.executed.push(name.to_string());
        inner.timeouts.push(ctx.poller().timeout());
        inner.active += 1;
        inner.max_active = inner.max_active.max(inner.active);
    }

    fn unit_ended(&self, name: &str, ctx: &UnitContext) {
        let mut inner = self.inner.lock().unwrap();
        inner.events.push(format!("end:{}:{name}", ctx.run_id()));
        inner.active -= 1;
    }
}

/// What a fake unit does when run.
#[derive(Clone)]
pub enum Behaviour {
    Pass,
    Fail(String),
    Panic(String),
    /// Sleep, then pass.
    Sleep(Duration),
    /// Poll `flag` with the context's poller (optionally overriding its
    /// timeout); pass once it is set.
    WaitFor {
        flag: Arc<AtomicBool>,
        timeout: Option<Duration>,
    },
}

pub struct FakeUnit {
    pub(crate) name: String,
    pub(crate) supported: bool,
    pub(crate) focused: bool,
    pub(crate) behaviour: Behaviour,
    pub(crate) journal: Journal,
}

/// Records the end of a unit even when it panics.
struct EndGuard<'a> {
    unit: &'a FakeUnit,
    ctx: &'a UnitContext,
}

impl Drop for EndGuard<'_> {
    fn drop(&mut self) {
        self.unit.journal.unit_ended(&self.unit.name, self.ctx);
    }
}

impl FakeUnit {
    async fn execute(&self, ctx: &UnitContext) -> anyhow::Result<()> {
        self.journal.unit_started(&self.name, ctx);
        let _guard = EndGuard { unit: self, ctx };

        match &self.behaviour {
            Behaviour::Pass => Ok(()),
            Behaviour::Fail(msg) => Err(anyhow::anyhow!("{msg}")),
            Behaviour::Panic(msg) => panic!("{msg}"),
            Behaviour::Sleep(d) => {
                tokio::time::sleep(*d).await;
                Ok(())
            }
            Behaviour::WaitFor { flag, timeout } => {
                let mut poller = ctx.poller();
                if let Some(t) = timeout {
                    poller = poller.with_timeout(*t);
                }
                poller
                    .until(|| Ok::<_, Infallible>(flag.load(Ordering::SeqCst)))
                    .await?;
                Ok(())
            }
        }
    }
}

impl TestUnit for FakeUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_current_platform(&self) -> bool {
        self.supported
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn run<'a>(&'a self, ctx: &'a UnitContext) -> UnitFuture<'a> {
        Box::pin(self.execute(ctx))
    }
}

use shared::protocol::DescribeRequest;
use tracing::{debug, info};

use crate::{
    error::DemoError,
    store::{DemoEvent, DemoStore, InFlight, RunKind, RunOutcome},
};

impl DemoStore {
    /// Ask the backend to narrate the current result. Without a result this
    /// does nothing and returns [`RunOutcome::Skipped`].
    pub async fn generate_description(&self) -> Result<RunOutcome, DemoError> {
        let kind = RunKind::Description;
        let started = {
            let mut inner = self.lock();
            let Some(result) = inner.state.result.as_ref() else {
                debug!("no prediction result to describe");
                return Ok(RunOutcome::Skipped);
            };
            let request = DescribeRequest::from(result);
            match self.check_overlap(&inner, kind) {
                Err(err) => Err(err),
                Ok(()) => {
                    let token = inner.next_token(kind);
                    inner.state.describing = true;
                    inner.state.error = None;
                    Ok((token, request))
                }
            }
        };
        let (token, request) = match started {
            Ok(started) => started,
            Err(err) => return Err(self.record_rejection(kind, err)),
        };
        self.emit(DemoEvent::RunStarted { kind, token });

        let flight = InFlight::new(self, kind, token);
        info!(
            top_classes = request.top_classes.len(),
            area_stats = request.area_stats.len(),
            token,
            "requesting description"
        );
        let outcome = self.api.describe(&request).await;

        self.settle(flight, outcome, |inner, description| {
            inner.state.description = Some(description);
        })
    }
}

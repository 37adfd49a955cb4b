//! Delivery abstraction for continuation directives.
//!
//! The [`Delivery`] trait decouples the continuation controller from the host
//! messaging transport. Tests use scripted deliveries that record requests or
//! fail on demand.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

/// A directive addressed to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub session_id: String,
    /// Agent role the directive is tagged with.
    pub agent: String,
    pub text: String,
}

/// Abstraction over the host transport.
pub trait Delivery {
    /// Hand `request` to the session. An error counts as a failed attempt.
    fn deliver(&self, request: &DeliveryRequest) -> Result<()>;
}

impl<D: Delivery + ?Sized> Delivery for &D {
    fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        (**self).deliver(request)
    }
}

/// Writes directives to stdout, framed with the target session and agent.
pub struct StdoutDelivery;

impl Delivery for StdoutDelivery {
    #[instrument(skip_all, fields(session_id = %request.session_id, agent = %request.agent))]
    fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        write_framed(&mut stdout, request).context("write directive to stdout")?;
        stdout.flush().context("flush stdout")?;
        debug!(bytes = request.text.len(), "directive delivered");
        Ok(())
    }
}

fn write_framed(out: &mut impl Write, request: &DeliveryRequest) -> std::io::Result<()> {
    writeln!(
        out,
        "<!-- session:{} agent:{} -->",
        request.session_id, request.agent
    )?;
    out.write_all(request.text.as_bytes())?;
    if !request.text.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}

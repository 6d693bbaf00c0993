//! [`SimulatorClient`] – the step-driven simulator link.
//!
//! The simulator advances exactly one physics step per call.  Commands in a
//! batch are applied in order before the step; the returned frames describe
//! the world after it.  An empty batch is a pure "advance one step and
//! report" request.

use transport_types::{Command, OutputFrame, TransportError};

/// Synchronous request/response channel to a simulator.
///
/// Implementations must be usable behind `&mut dyn SimulatorClient` so that
/// [`RobotBody`](crate::body::RobotBody) implementations stay independent of
/// the concrete transport.
pub trait SimulatorClient {
    /// Send one ordered command batch, advance one step, and return the
    /// resulting output frames.
    fn communicate(&mut self, commands: &[Command]) -> Result<Vec<OutputFrame>, TransportError>;
}

impl<T: SimulatorClient + ?Sized> SimulatorClient for Box<T> {
    fn communicate(&mut self, commands: &[Command]) -> Result<Vec<OutputFrame>, TransportError> {
        (**self).communicate(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        batches: Vec<Vec<Command>>,
    }

    impl SimulatorClient for Recorder {
        fn communicate(
            &mut self,
            commands: &[Command],
        ) -> Result<Vec<OutputFrame>, TransportError> {
            self.batches.push(commands.to_vec());
            Ok(vec![OutputFrame::Unknown])
        }
    }

    #[test]
    fn boxed_client_forwards_batches() {
        let mut boxed: Box<dyn SimulatorClient> = Box::new(Recorder { batches: vec![] });
        let frames = boxed.communicate(&[Command::SendStaticObjects]).unwrap();
        assert_eq!(frames, vec![OutputFrame::Unknown]);
    }

    #[test]
    fn empty_batch_is_a_valid_step() {
        let mut rec = Recorder { batches: vec![] };
        rec.communicate(&[]).unwrap();
        assert_eq!(rec.batches.len(), 1);
        assert!(rec.batches[0].is_empty());
    }
}

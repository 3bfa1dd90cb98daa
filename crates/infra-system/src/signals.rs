// Domain signal -> nix signal
use cascade_core::domain::TerminationSignal;
use nix::sys::signal::Signal;

pub(crate) fn to_nix_signal(signal: TerminationSignal) -> Signal {
    match signal {
        TerminationSignal::Kill => Signal::SIGKILL,
        TerminationSignal::Terminate => Signal::SIGTERM,
    }
}

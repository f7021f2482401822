use failure::Fail;

/// Errors of the IR driver operations
///
/// All of them are recoverable: after `NoSignal` or `Aborted` learning can
/// simply be retried, after `NotInitialized` call `init_ir` first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Fail)]
pub enum IrError {
	#[fail(display = "IR timer not initialized")]
	NotInitialized,
	#[fail(display = "invalid timer configuration: {}", _0)]
	InvalidTimerConfig(&'static str),
	#[fail(display = "pulse duration must be at least one tick")]
	InvalidDuration,
	#[fail(display = "pulse sequence is empty")]
	EmptySequence,
	/// sequence doesn't fit into the pulse buffer
	#[fail(display = "signal too long")]
	SigTooLong,
	/// nothing received while waiting for the first mark
	#[fail(display = "no signal detected")]
	NoSignal,
	#[fail(display = "HIGH pulse too long")]
	HighPulseTooLong,
	#[fail(display = "LOW pulse too long")]
	LowPulseTooLong,
	#[fail(display = "capture aborted")]
	Aborted,
}

use crate::{
    altimeter::{AbsoluteAltitudeData, AuthorizationStatus, RelativeAltitudeData},
    error::SensorError,
};

/// One invocation of a stream handler: an error, a data record, or nothing.
pub type Delivery<T> = Result<Option<T>, SensorError>;

/// Callback registered with a stream. May be called repeatedly from any thread.
pub type UpdateHandler<T> = Box<dyn FnMut(Delivery<T>) + Send + 'static>;

/// Barometric altitude sensor exposed by the platform.
///
/// The two streams are independent. Starting a stream that is already running
/// replaces its handler. Stopping must be idempotent.
pub trait AltitudeService {
    fn is_relative_available(&self) -> bool;

    fn is_absolute_available(&self) -> bool;

    fn authorization_status(&self) -> AuthorizationStatus;

    fn start_relative_updates(&self, handler: UpdateHandler<RelativeAltitudeData>);

    fn stop_relative_updates(&self);

    fn start_absolute_updates(&self, handler: UpdateHandler<AbsoluteAltitudeData>);

    fn stop_absolute_updates(&self);
}

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use homelink::device::{
    AcMode, DeviceKind, MAX_FAN_SPEED, MAX_TEMPERATURE, MIN_TEMPERATURE, is_valid_speed,
    is_valid_temperature,
};
use homelink::discovery::Beacon;
use homelink::info::{DetailedInfo, DeviceInfo};
use homelink::request::{Command, Request, TimerAction};
use homelink::response::{Response, Status};

use serde::de::DeserializeOwned;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use tracing::{debug, info, warn};

use crate::error::{Error, ErrorKind, Result};

/// Maximum size of a response read from a device.
pub const BUFFER_SIZE: usize = 4096;

/// Default number of connection attempts.
pub const CONNECT_ATTEMPTS: u32 = 3;

/// Default delay between two connection attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Default time to wait for a response.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// A client-side handle to a single device.
///
/// The connection is opened lazily on the first request and kept open
/// for the following ones. Any failure closes the connection and marks the
/// device as unreachable, the next request connects again.
#[derive(Debug)]
pub struct DeviceProxy {
    beacon: Beacon,
    client_id: Arc<str>,
    token: Option<String>,
    stream: Option<TcpStream>,
    reachable: bool,
    connect_attempts: u32,
    retry_delay: Duration,
    read_timeout: Duration,
}

impl DeviceProxy {
    /// Creates a [`DeviceProxy`] for the device described by a [`Beacon`].
    #[must_use]
    #[inline]
    pub fn new(beacon: Beacon, client_id: Arc<str>) -> Self {
        Self {
            beacon,
            client_id,
            token: None,
            stream: None,
            reachable: false,
            connect_attempts: CONNECT_ATTEMPTS,
            retry_delay: RETRY_DELAY,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Sets the number of connection attempts.
    ///
    /// A single attempt is always made.
    #[must_use]
    #[inline]
    pub fn connect_attempts(mut self, connect_attempts: u32) -> Self {
        self.connect_attempts = connect_attempts.max(1);
        self
    }

    /// Sets the delay between two connection attempts.
    #[must_use]
    #[inline]
    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Sets the time to wait for a response.
    #[must_use]
    #[inline]
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Returns the device identifier.
    #[must_use]
    #[inline]
    pub fn id(&self) -> &str {
        &self.beacon.id
    }

    /// Returns the device kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> DeviceKind {
        self.beacon.kind
    }

    /// Returns the [`Beacon`] the proxy has been created from.
    #[must_use]
    #[inline]
    pub const fn beacon(&self) -> &Beacon {
        &self.beacon
    }

    /// Returns the client identifier sent along with each request.
    #[must_use]
    #[inline]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns whether a token is cached.
    #[must_use]
    #[inline]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Returns whether the last interaction with the device succeeded.
    #[must_use]
    #[inline]
    pub const fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Opens the connection to the device, if not already open.
    ///
    /// # Errors
    ///
    /// An error is returned when all connection attempts fail.
    pub async fn connect(&mut self) -> Result<()> {
        self.stream().await.map(|_| ())
    }

    /// Closes the connection to the device.
    ///
    /// The cached token is kept.
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("Disconnected from device `{}`", self.beacon.id);
        }
    }

    /// Sends a [`Command`] and returns the device [`Response`].
    ///
    /// Statuses other than `403` are returned as they are, so the caller
    /// decides how to interpret them.
    ///
    /// # Errors
    ///
    /// An error is returned when the device cannot be reached, when the
    /// response is missing or unreadable, and when the device refuses the
    /// cached token. In the last case the token is cleared.
    pub async fn send_request(&mut self, command: Command) -> Result<Response> {
        let action = command.action();

        match self.exchange(command).await {
            Ok(response) if response.status == Status::Forbidden => {
                self.token = None;
                self.mark_unreachable();
                Err(Error::new(
                    ErrorKind::TokenInvalidOrExpired,
                    "Token expired or invalid.",
                ))
            }
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(
                    "Request `{action}` to device `{}` failed: {e}",
                    self.beacon.id
                );
                self.mark_unreachable();
                Err(e)
            }
        }
    }

    /// Authenticates with the device password and caches the issued token.
    ///
    /// # Errors
    ///
    /// An error is returned when the password is wrong or the request fails.
    pub async fn authenticate(&mut self, password: &str) -> Result<()> {
        let response = self
            .expect_ok(Command::Authenticate {
                password: password.into(),
            })
            .await?;

        let token = response.token.ok_or_else(|| {
            Error::new(
                ErrorKind::MalformedResponse,
                "Authentication response without a token.",
            )
        })?;

        self.token = Some(token);

        info!("Authenticated with device `{}`", self.beacon.id);

        Ok(())
    }

    /// Asks the device whether the cached token is still valid.
    ///
    /// # Errors
    ///
    /// An error is returned when the token is refused or the request fails.
    pub async fn validate_token(&mut self) -> Result<()> {
        self.expect_ok(Command::ValidateToken).await.map(|_| ())
    }

    /// Changes the device password.
    ///
    /// # Errors
    ///
    /// An error is returned when the current password is wrong or the
    /// request fails.
    pub async fn change_password(
        &mut self,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.expect_ok(Command::ChangePassword {
            current_password: current_password.into(),
            new_password: new_password.into(),
        })
        .await
        .map(|_| ())
    }

    /// Turns the device on.
    ///
    /// # Errors
    ///
    /// An error is returned when the device is already on or the request
    /// fails.
    pub async fn turn_on(&mut self) -> Result<()> {
        self.expect_ok(Command::TurnOn).await.map(|_| ())
    }

    /// Turns the device off.
    ///
    /// # Errors
    ///
    /// An error is returned when the device is already off or the request
    /// fails.
    pub async fn turn_off(&mut self) -> Result<()> {
        self.expect_ok(Command::TurnOff).await.map(|_| ())
    }

    /// Schedules an action on the device after the given number of seconds.
    ///
    /// # Errors
    ///
    /// An error is returned when the request fails.
    pub async fn set_timer(&mut self, duration: u64, timer_action: TimerAction) -> Result<()> {
        self.expect_ok(Command::SetTimer {
            duration,
            timer_action,
        })
        .await
        .map(|_| ())
    }

    /// Cancels all timers scheduled on the device.
    ///
    /// # Errors
    ///
    /// An error is returned when the request fails.
    pub async fn cancel_timers(&mut self) -> Result<()> {
        self.expect_ok(Command::CancelTimers).await.map(|_| ())
    }

    /// Retrieves the device status.
    ///
    /// # Errors
    ///
    /// An error is returned when the request fails or the status cannot be
    /// interpreted.
    pub async fn info(&mut self) -> Result<DeviceInfo> {
        let response = self.expect_ok(Command::Status).await?;
        data(response)
    }

    /// Retrieves the device status along with its runtime statistics.
    ///
    /// # Errors
    ///
    /// An error is returned when the request fails or the details cannot be
    /// interpreted.
    pub async fn detailed_info(&mut self) -> Result<DetailedInfo> {
        let response = self.expect_ok(Command::Details).await?;
        data(response)
    }

    // Sends a command and turns any status other than 200 into an error.
    async fn expect_ok(&mut self, command: Command) -> Result<Response> {
        let response = self.send_request(command).await?;

        match response.status {
            Status::Ok => Ok(response),
            Status::Unauthorized => Err(Error::new(
                ErrorKind::AuthenticationFailed,
                response.message,
            )),
            _ => Err(Error::new(ErrorKind::Rejected, response.message)),
        }
    }

    async fn exchange(&mut self, command: Command) -> Result<Response> {
        let mut request = Request::new(self.client_id.as_ref(), command);
        if let Some(token) = &self.token {
            request = request.token(token.as_str());
        }

        let bytes = serde_json::to_vec(&request).map_err(|e| {
            Error::new(
                ErrorKind::TransportFailure,
                format!("Failed to serialize the request: {e}"),
            )
        })?;

        let read_timeout = self.read_timeout;
        let stream = self.stream().await?;

        stream.write_all(&bytes).await?;

        let mut buffer = vec![0; BUFFER_SIZE];
        let read = tokio::time::timeout(read_timeout, stream.read(&mut buffer))
            .await
            .map_err(|_| {
                Error::new(
                    ErrorKind::TransportFailure,
                    "Timed out waiting for a response from the device.",
                )
            })??;

        if read == 0 {
            return Err(Error::new(
                ErrorKind::TransportFailure,
                "No response received from device.",
            ));
        }

        serde_json::from_slice(&buffer[..read]).map_err(|e| {
            Error::new(
                ErrorKind::TransportFailure,
                format!("Failed to parse the device response: {e}"),
            )
        })
    }

    async fn stream(&mut self) -> Result<&mut TcpStream> {
        if self.stream.is_none() {
            let stream = self.open().await?;
            self.stream = Some(stream);
            self.reachable = true;
        }

        self.stream.as_mut().ok_or_else(|| {
            Error::new(
                ErrorKind::ConnectionFailed,
                "Connection to the device is not open.",
            )
        })
    }

    async fn open(&self) -> Result<TcpStream> {
        let address = (self.beacon.ip_address.as_str(), self.beacon.port);

        for attempt in 1..=self.connect_attempts {
            match TcpStream::connect(address).await {
                Ok(stream) => {
                    debug!(
                        "Connected to device `{}` at {}:{}",
                        self.beacon.id, self.beacon.ip_address, self.beacon.port
                    );
                    return Ok(stream);
                }
                Err(e) => {
                    warn!(
                        "Connection attempt {attempt}/{} to device `{}` failed: {e}",
                        self.connect_attempts, self.beacon.id
                    );
                    if attempt < self.connect_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(Error::new(
            ErrorKind::ConnectionFailed,
            format!(
                "Failed to connect to device `{}` at {}:{} after {} attempts.",
                self.beacon.id, self.beacon.ip_address, self.beacon.port, self.connect_attempts
            ),
        ))
    }

    fn mark_unreachable(&mut self) {
        self.reachable = false;
        self.disconnect();
    }
}

fn data<T: DeserializeOwned>(response: Response) -> Result<T> {
    let data = response.data.ok_or_else(|| {
        Error::new(ErrorKind::MalformedResponse, "Response without data.")
    })?;

    Ok(serde_json::from_value(data)?)
}

/// A proxy to a light.
#[derive(Debug)]
pub struct LightProxy(DeviceProxy);

/// A proxy to a fan, which can also change its speed.
#[derive(Debug)]
pub struct FanProxy(DeviceProxy);

impl FanProxy {
    /// Sets the fan speed.
    ///
    /// # Errors
    ///
    /// An error is returned without contacting the device when the speed
    /// is out of range, and when the request fails.
    pub async fn set_speed(&mut self, speed: i64) -> Result<()> {
        if !is_valid_speed(speed) {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                format!("Invalid fan speed. Must be between 0 and {MAX_FAN_SPEED}."),
            ));
        }

        self.0
            .expect_ok(Command::SetSpeed { speed })
            .await
            .map(|_| ())
    }
}

/// A proxy to an air conditioner, which can also change its mode and its
/// temperature.
#[derive(Debug)]
pub struct AcProxy(DeviceProxy);

impl AcProxy {
    /// Sets the air conditioner mode.
    ///
    /// # Errors
    ///
    /// An error is returned when the request fails.
    pub async fn set_mode(&mut self, mode: AcMode) -> Result<()> {
        self.0
            .expect_ok(Command::SetMode { mode })
            .await
            .map(|_| ())
    }

    /// Sets the target temperature.
    ///
    /// # Errors
    ///
    /// An error is returned without contacting the device when the
    /// temperature is out of range, and when the request fails.
    pub async fn set_temperature(&mut self, temperature: i64) -> Result<()> {
        if !is_valid_temperature(temperature) {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                format!(
                    "Invalid temperature. Must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}."
                ),
            ));
        }

        self.0
            .expect_ok(Command::SetTemperature { temperature })
            .await
            .map(|_| ())
    }
}

macro_rules! typed_proxy {
    ($($proxy:ident),+) => {
        $(
            impl Deref for $proxy {
                type Target = DeviceProxy;

                fn deref(&self) -> &Self::Target {
                    &self.0
                }
            }

            impl DerefMut for $proxy {
                fn deref_mut(&mut self) -> &mut Self::Target {
                    &mut self.0
                }
            }

            impl $proxy {
                /// Returns the underlying [`DeviceProxy`].
                #[must_use]
                #[inline]
                pub fn into_inner(self) -> DeviceProxy {
                    self.0
                }
            }
        )+
    };
}

typed_proxy!(LightProxy, FanProxy, AcProxy);

/// A proxy typed after the kind of its device.
#[derive(Debug)]
pub enum KindProxy {
    /// A light.
    Light(LightProxy),
    /// A fan.
    Fan(FanProxy),
    /// An air conditioner.
    Ac(AcProxy),
}

impl From<DeviceProxy> for KindProxy {
    fn from(proxy: DeviceProxy) -> Self {
        match proxy.kind() {
            DeviceKind::Light => Self::Light(LightProxy(proxy)),
            DeviceKind::Fan => Self::Fan(FanProxy(proxy)),
            DeviceKind::Ac => Self::Ac(AcProxy(proxy)),
        }
    }
}

impl Deref for KindProxy {
    type Target = DeviceProxy;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Light(proxy) => &proxy.0,
            Self::Fan(proxy) => &proxy.0,
            Self::Ac(proxy) => &proxy.0,
        }
    }
}

impl DerefMut for KindProxy {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::Light(proxy) => &mut proxy.0,
            Self::Fan(proxy) => &mut proxy.0,
            Self::Ac(proxy) => &mut proxy.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use homelink::device::DeviceKind;
    use homelink::discovery::Beacon;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::error::ErrorKind;

    use super::{DeviceProxy, KindProxy};

    fn proxy(kind: DeviceKind, port: u16) -> DeviceProxy {
        DeviceProxy::new(
            Beacon::new(kind, "device-1", "127.0.0.1", port),
            Arc::from("client-1"),
        )
        .retry_delay(Duration::from_millis(10))
    }

    // Answers the first request of a single connection with the given bytes.
    async fn answer_once(reply: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let _ = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buffer = [0; 1024];
            let _ = stream.read(&mut buffer).await.unwrap();
            stream.write_all(reply).await.unwrap();
        });

        port
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_kind_proxy() {
        assert!(matches!(
            KindProxy::from(proxy(DeviceKind::Light, 1)),
            KindProxy::Light(_)
        ));
        assert!(matches!(
            KindProxy::from(proxy(DeviceKind::Fan, 1)),
            KindProxy::Fan(_)
        ));

        let proxy = KindProxy::from(proxy(DeviceKind::Ac, 1));
        assert!(matches!(proxy, KindProxy::Ac(_)));
        assert_eq!(proxy.id(), "device-1");
        assert!(!proxy.is_authenticated());
        assert!(!proxy.is_reachable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connection_failed() {
        let port = closed_port().await;
        let mut proxy = proxy(DeviceKind::Light, port).connect_attempts(2);

        let error = proxy.turn_on().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ConnectionFailed);
        assert!(!proxy.is_reachable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_empty_response() {
        let port = answer_once(b"").await;
        let mut proxy = proxy(DeviceKind::Light, port);

        let error = proxy.turn_on().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TransportFailure);
        assert!(!proxy.is_reachable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unparseable_response() {
        let port = answer_once(b"not json").await;
        let mut proxy = proxy(DeviceKind::Light, port);

        let error = proxy.turn_on().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TransportFailure);
        assert!(!proxy.is_reachable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Accepts the connection but never answers.
        let _ = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut proxy =
            proxy(DeviceKind::Light, port).read_timeout(Duration::from_millis(100));

        let error = proxy.turn_on().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TransportFailure);
        assert!(!proxy.is_reachable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejected_and_unauthorized() {
        let port =
            answer_once(br#"{"status":400,"message":"Error: Light is already on."}"#).await;
        let mut proxy = proxy(DeviceKind::Light, port);

        let error = proxy.turn_on().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Rejected);
        assert_eq!(error.description(), "Error: Light is already on.");
        // A rejection is an answer, the device is still reachable.
        assert!(proxy.is_reachable());

        let port = answer_once(br#"{"status":401,"message":"Authentication failed"}"#).await;
        let mut proxy = self::proxy(DeviceKind::Light, port);

        let error = proxy.authenticate("guess").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthenticationFailed);
        assert!(!proxy.is_authenticated());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_data() {
        let port =
            answer_once(br#"{"status":200,"message":"Status retrieved successfully"}"#).await;
        let mut proxy = proxy(DeviceKind::Fan, port);

        let error = proxy.info().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_out_of_range_without_connecting() {
        // Nothing listens on the port, a round trip would fail differently.
        let port = closed_port().await;

        let KindProxy::Fan(mut fan) = KindProxy::from(proxy(DeviceKind::Fan, port)) else {
            panic!("Expected a fan proxy");
        };
        assert_eq!(
            fan.set_speed(4).await.map_err(|e| e.kind()),
            Err(ErrorKind::OutOfRange)
        );
        assert_eq!(
            fan.set_speed(-1).await.map_err(|e| e.kind()),
            Err(ErrorKind::OutOfRange)
        );

        let KindProxy::Ac(mut ac) = KindProxy::from(proxy(DeviceKind::Ac, port)) else {
            panic!("Expected an air conditioner proxy");
        };
        assert_eq!(
            ac.set_temperature(17).await.map_err(|e| e.kind()),
            Err(ErrorKind::OutOfRange)
        );
        assert_eq!(
            ac.set_temperature(31).await.map_err(|e| e.kind()),
            Err(ErrorKind::OutOfRange)
        );
    }
}

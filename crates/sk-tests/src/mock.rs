//! In-process drivers and layers that record which node served each call.

use std::sync::Arc;

use parking_lot::Mutex;
use sk_core::{
    attach_layer, Allocator, CreateDriverFn, CreateInstanceFn, CreatePcmStreamFn, DeviceProperties,
    Driver, DriverCreateInfo, DriverProperties, DriverTable, EndpointDirection,
    EndpointProperties, EnumerateDeviceEndpointsFn, EnumerateDevicesFn, GetDriverPropertiesFn,
    GetPcmStreamInfoFn, InstanceCreateInfo, InstanceTable, Object, PcmStream,
    PcmStreamAvailableFn, PcmStreamConfig, PcmStreamCreateInfo, PcmStreamInfo, PcmStreamTable,
    ProcMap, ProcResolver, SkError, SkObject, SkResult, StartPcmStreamFn, StopPcmStreamFn, Uuid,
    WritePcmStreamFn,
};

/// Ordered record of which node served which call.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

pub const fn identity(tag: u8) -> Uuid {
    Uuid::from_bytes([tag; 16])
}

/// Terminal state of a mock stream.
#[derive(Debug)]
pub struct MockStream {
    pub config: PcmStreamConfig,
    pub direction: EndpointDirection,
    pub running: Mutex<bool>,
    pub written: Mutex<Vec<u8>>,
}

fn stream_state(stream: &PcmStream) -> SkResult<&MockStream> {
    stream.terminal_state::<MockStream>().ok_or(SkError::SystemInternal)
}

/// A driver exposing one device with a playback and a capture endpoint.
///
/// Streams support everything except reading.
#[derive(Debug, Clone)]
pub struct MockDriver {
    pub identity: Uuid,
    pub name: String,
    pub log: CallLog,
    /// Make `skCreateDriver` fail with this error.
    pub fail_with: Option<SkError>,
}

impl MockDriver {
    pub fn new(identity: Uuid, name: impl Into<String>, log: CallLog) -> Self {
        Self {
            identity,
            name: name.into(),
            log,
            fail_with: None,
        }
    }

    pub fn failing(mut self, err: SkError) -> Self {
        self.fail_with = Some(err);
        self
    }

    pub fn properties(&self) -> DriverProperties {
        DriverProperties {
            identity: self.identity,
            name: self.name.clone(),
            display_name: self.name.to_uppercase(),
            ..DriverProperties::default()
        }
    }

    pub fn resolver(&self) -> Arc<dyn ProcResolver> {
        let mut procs = self.entry_points();
        let terminal: Arc<dyn ProcResolver> = Arc::new(procs.clone());
        let identity = self.identity;
        let fail_with = self.fail_with;
        let create: CreateDriverFn = Arc::new(
            move |info: &DriverCreateInfo, allocator: &Allocator| -> SkResult<Driver> {
                if let Some(err) = fail_with {
                    return Err(err);
                }
                Object::terminal(identity, info.instance, terminal.clone(), None, allocator)
            },
        );
        procs.insert("skCreateDriver", create);
        Arc::new(procs)
    }

    fn entry_points(&self) -> ProcMap {
        let mut procs = ProcMap::new();

        let (log, properties) = (self.log.clone(), self.properties());
        let get_properties: GetDriverPropertiesFn =
            Arc::new(move |_: &Driver| -> SkResult<DriverProperties> {
                log.record("driver:properties");
                Ok(properties.clone())
            });
        procs.insert("skGetDriverProperties", get_properties);

        let log = self.log.clone();
        let devices: EnumerateDevicesFn =
            Arc::new(move |_: &Driver| -> SkResult<Vec<DeviceProperties>> {
                log.record("driver:devices");
                Ok(vec![DeviceProperties {
                    identity: identity(0xde),
                    name: "mock-device".into(),
                    display_name: "Mock Device".into(),
                }])
            });
        procs.insert("skEnumerateDevices", devices);

        let endpoints: EnumerateDeviceEndpointsFn = Arc::new(
            |_: &Driver, _: &sk_core::Device| -> SkResult<Vec<EndpointProperties>> {
                Ok(vec![
                    EndpointProperties {
                        identity: identity(0xe0),
                        name: "out".into(),
                        direction: EndpointDirection::Playback,
                        channels: 2,
                    },
                    EndpointProperties {
                        identity: identity(0xe1),
                        name: "in".into(),
                        direction: EndpointDirection::Capture,
                        channels: 2,
                    },
                ])
            },
        );
        procs.insert("skEnumerateDeviceEndpoints", endpoints);

        let stream_procs: Arc<dyn ProcResolver> = Arc::new(self.stream_entry_points());
        let driver = self.identity;
        let create_stream: CreatePcmStreamFn = Arc::new(
            move |info: &PcmStreamCreateInfo, allocator: &Allocator| -> SkResult<PcmStream> {
                let state = MockStream {
                    config: info.config,
                    direction: info.endpoint.properties().direction,
                    running: Mutex::new(false),
                    written: Mutex::new(Vec::new()),
                };
                Object::terminal(
                    driver,
                    Some(info.endpoint.handle()),
                    stream_procs.clone(),
                    Some(Box::new(state)),
                    allocator,
                )
            },
        );
        procs.insert("skCreatePcmStream", create_stream);
        procs
    }

    fn stream_entry_points(&self) -> ProcMap {
        let info: GetPcmStreamInfoFn =
            Arc::new(|stream: &PcmStream| -> SkResult<PcmStreamInfo> {
                let state = stream_state(stream)?;
                Ok(PcmStreamInfo {
                    config: state.config,
                    direction: state.direction,
                    running: *state.running.lock(),
                })
            });
        let start: StartPcmStreamFn = Arc::new(|stream: &PcmStream| -> SkResult<()> {
            *stream_state(stream)?.running.lock() = true;
            Ok(())
        });
        let stop: StopPcmStreamFn = Arc::new(|stream: &PcmStream| -> SkResult<()> {
            *stream_state(stream)?.running.lock() = false;
            Ok(())
        });
        let log = self.log.clone();
        let write: WritePcmStreamFn =
            Arc::new(move |stream: &PcmStream, data: &[u8]| -> SkResult<usize> {
                let state = stream_state(stream)?;
                if !*state.running.lock() {
                    return Err(SkError::Invalid);
                }
                log.record("driver:write");
                state.written.lock().extend_from_slice(data);
                Ok(data.len())
            });
        let available: PcmStreamAvailableFn =
            Arc::new(|stream: &PcmStream| -> SkResult<u64> {
                let state = stream_state(stream)?;
                let frames = state.written.lock().len() / state.config.frame_size();
                Ok(u64::from(state.config.buffer_frames).saturating_sub(frames as u64))
            });
        ProcMap::new()
            .with("skGetPcmStreamInfo", info)
            .with("skStartPcmStream", start)
            .with("skStopPcmStream", stop)
            .with("skWritePcmStream", write)
            .with("skPcmStreamAvailable", available)
    }
}

/// Private state a layer keeps on its driver node.
#[derive(Debug)]
pub struct CachedInner(pub Arc<sk_core::SharedTable<DriverTable>>);

/// A layer that joins instance, driver and (optionally) stream chains.
#[derive(Debug, Clone)]
pub struct MockLayer {
    pub identity: Uuid,
    pub name: String,
    pub log: CallLog,
    serve_properties: bool,
    forward_properties: bool,
    intercept_writes: bool,
    cache_inner: bool,
}

impl MockLayer {
    pub fn new(identity: Uuid, name: impl Into<String>, log: CallLog) -> Self {
        Self {
            identity,
            name: name.into(),
            log,
            serve_properties: false,
            forward_properties: false,
            intercept_writes: false,
            cache_inner: false,
        }
    }

    /// Answer `skGetDriverProperties` itself, renaming the driver.
    pub fn serving_properties(mut self) -> Self {
        self.serve_properties = true;
        self
    }

    /// Log `skGetDriverProperties` and pass it down.
    pub fn forwarding_properties(mut self) -> Self {
        self.forward_properties = true;
        self
    }

    /// Join stream chains and log every write before passing it down.
    pub fn intercepting_writes(mut self) -> Self {
        self.intercept_writes = true;
        self
    }

    /// Keep an `Arc` of the table beneath this layer in its node state.
    pub fn caching_inner_table(mut self) -> Self {
        self.cache_inner = true;
        self
    }

    pub fn resolver(&self) -> Arc<dyn ProcResolver> {
        let mut procs = ProcMap::new();
        let layer = self.identity;

        let create_instance: CreateInstanceFn =
            Arc::new(move |info: &InstanceCreateInfo, allocator: &Allocator| {
                attach_layer::<InstanceTable>(layer, info, allocator)
            });
        procs.insert("skCreateInstance", create_instance);

        let cache_inner = self.cache_inner;
        let create_driver: CreateDriverFn = Arc::new(
            move |info: &DriverCreateInfo, allocator: &Allocator| -> SkResult<Driver> {
                let mut driver = attach_layer::<DriverTable>(layer, info, allocator)?;
                if cache_inner {
                    let inner = driver.next_shared_dispatch(layer)?;
                    driver.set_node_state(layer, Box::new(CachedInner(inner)))?;
                }
                Ok(driver)
            },
        );
        procs.insert("skCreateDriver", create_driver);

        if self.serve_properties {
            let (log, name) = (self.log.clone(), self.name.clone());
            let serve: GetDriverPropertiesFn =
                Arc::new(move |driver: &Driver| -> SkResult<DriverProperties> {
                    log.record(format!("{name}:properties"));
                    Ok(DriverProperties {
                        identity: driver.identity(),
                        name: format!("{name}-wrapped"),
                        ..DriverProperties::default()
                    })
                });
            procs.insert("skGetDriverProperties", serve);
        } else if self.forward_properties {
            let (log, name) = (self.log.clone(), self.name.clone());
            let forward: GetDriverPropertiesFn =
                Arc::new(move |driver: &Driver| -> SkResult<DriverProperties> {
                    log.record(format!("{name}:properties"));
                    let next = driver
                        .next_dispatch(layer)?
                        .get_driver_properties
                        .as_ref()
                        .ok_or(SkError::NotSupported)?;
                    next(driver)
                });
            procs.insert("skGetDriverProperties", forward);
        }

        if self.intercept_writes {
            let create_stream: CreatePcmStreamFn =
                Arc::new(move |info: &PcmStreamCreateInfo, allocator: &Allocator| {
                    attach_layer::<PcmStreamTable>(layer, info, allocator)
                });
            procs.insert("skCreatePcmStream", create_stream);

            let (log, name) = (self.log.clone(), self.name.clone());
            let write: WritePcmStreamFn =
                Arc::new(move |stream: &PcmStream, data: &[u8]| -> SkResult<usize> {
                    log.record(format!("{name}:write"));
                    let next = stream
                        .next_dispatch(layer)?
                        .write_pcm_stream
                        .as_ref()
                        .ok_or(SkError::NotSupported)?;
                    next(stream, data)
                });
            procs.insert("skWritePcmStream", write);
        }

        Arc::new(procs)
    }
}

use crate::chain::{create_object, ChainEntry, CreateChain, CreateInfo};
use crate::driver::DriverTable;
use crate::object::{Endpoint, Object, ObjectHandle, ObjectKind, SkObject};
use crate::properties::EndpointDirection;
use crate::result::{SkError, SkResult};
use crate::table::{CreateFn, Dispatchable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    S16Le,
    S24Le,
    S32Le,
    #[default]
    F32Le,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::S24Le => 3,
            SampleFormat::S32Le | SampleFormat::F32Le => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcmStreamConfig {
    pub sample_rate: u32,
    pub channels: u32,
    pub format: SampleFormat,
    /// Requested buffer size in frames.
    pub buffer_frames: u32,
}

impl PcmStreamConfig {
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }
}

impl Default for PcmStreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            format: SampleFormat::default(),
            buffer_frames: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmStreamInfo {
    pub config: PcmStreamConfig,
    pub direction: EndpointDirection,
    pub running: bool,
}

dispatch_table! {
    /// Entry points of a PCM stream chain.
    pub struct PcmStreamTable {
        get_pcm_stream_info: GetPcmStreamInfoFn =
            "skGetPcmStreamInfo" => fn(&PcmStream) -> SkResult<PcmStreamInfo>;
        start_pcm_stream: StartPcmStreamFn =
            "skStartPcmStream" => fn(&PcmStream) -> SkResult<()>;
        stop_pcm_stream: StopPcmStreamFn =
            "skStopPcmStream" => fn(&PcmStream) -> SkResult<()>;
        write_pcm_stream: WritePcmStreamFn =
            "skWritePcmStream" => fn(&PcmStream, &[u8]) -> SkResult<usize>;
        read_pcm_stream: ReadPcmStreamFn =
            "skReadPcmStream" => fn(&PcmStream, &mut [u8]) -> SkResult<usize>;
        pcm_stream_available: PcmStreamAvailableFn =
            "skPcmStreamAvailable" => fn(&PcmStream) -> SkResult<u64>;
    }
}

impl Dispatchable for PcmStreamTable {
    type CreateInfo = PcmStreamCreateInfo;
    const KIND: ObjectKind = ObjectKind::PcmStream;
    const CREATE_SYMBOL: &'static str = "skCreatePcmStream";
}

pub type PcmStream = Object<PcmStreamTable>;
pub type CreatePcmStreamFn = CreateFn<PcmStreamTable>;

#[derive(Debug, Clone)]
pub struct PcmStreamCreateInfo {
    pub endpoint: Endpoint,
    pub config: PcmStreamConfig,
    pub chain: CreateChain,
}

impl CreateInfo for PcmStreamCreateInfo {
    fn chain(&self) -> &CreateChain {
        &self.chain
    }

    fn parent(&self) -> Option<ObjectHandle> {
        Some(self.endpoint.handle())
    }
}

impl Object<DriverTable> {
    /// Open a stream on `endpoint` through every layer of this driver.
    pub fn create_pcm_stream(
        &self,
        endpoint: &Endpoint,
        config: PcmStreamConfig,
    ) -> SkResult<PcmStream> {
        if endpoint.driver_handle() != self.handle() {
            log::warn!("endpoint {:?} belongs to another driver", endpoint.handle());
            return Err(SkError::Invalid);
        }
        let chain = self
            .nodes()
            .map(|node| {
                let resolver = node.resolver().clone();
                if node.is_layer() {
                    ChainEntry::layer(node.identity(), resolver)
                } else {
                    ChainEntry::driver(node.identity(), resolver)
                }
            })
            .collect();
        let info = PcmStreamCreateInfo {
            endpoint: endpoint.clone(),
            config,
            chain,
        };
        let stream = create_object::<PcmStreamTable>(&info, self.allocator())?;
        stream.retain_libraries_of(self);
        Ok(stream)
    }
}

impl Object<PcmStreamTable> {
    pub fn info(&self) -> SkResult<PcmStreamInfo> {
        let get = self
            .dispatch()
            .get_pcm_stream_info
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        get(self)
    }

    pub fn start(&self) -> SkResult<()> {
        let start = self
            .dispatch()
            .start_pcm_stream
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        start(self)
    }

    pub fn stop(&self) -> SkResult<()> {
        let stop = self
            .dispatch()
            .stop_pcm_stream
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        stop(self)
    }

    /// Queue interleaved frames; returns the number of bytes accepted.
    pub fn write(&self, data: &[u8]) -> SkResult<usize> {
        let write = self
            .dispatch()
            .write_pcm_stream
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        write(self, data)
    }

    pub fn read(&self, data: &mut [u8]) -> SkResult<usize> {
        let read = self
            .dispatch()
            .read_pcm_stream
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        read(self, data)
    }

    /// Frames that can be written (playback) or read (capture) without blocking.
    pub fn available(&self) -> SkResult<u64> {
        let available = self
            .dispatch()
            .pcm_stream_available
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        available(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_follows_format() {
        let config = PcmStreamConfig {
            channels: 2,
            format: SampleFormat::S24Le,
            ..PcmStreamConfig::default()
        };
        assert_eq!(config.frame_size(), 6);
        assert_eq!(PcmStreamConfig::default().frame_size(), 8);
    }
}

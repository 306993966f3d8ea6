//! This module contains a declaration of the `CqlTransport` trait, which represents a single
//! multiplexed connection to a node, and its default TCP implementation.
//!
//! Every in-flight request holds one stream id of its connection. Ids are assigned when a frame is
//! sent, always picking the lowest free one, and become reusable only after the server answered.
//! Dropping a request future before the answer arrives leaves its stream id *orphaned* until the
//! late response is drained.
use derive_more::Constructor;
use futures::FutureExt;
use fxhash::{FxHashMap, FxHashSet};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::*;

#[cfg(test)]
use mockall::*;

use crate::cluster::KeyspaceHolder;
use crate::frame::message_result::ResultKind;
use crate::frame::{Frame, FromCursor, Opcode, StreamId, Version, EVENT_STREAM_ID};
use crate::frame_parser::{convert_frame_into_result, parse_frame};
use crate::future::BoxFuture;
use crate::Error;
use crate::Result;

/// Number of stream ids available to requests on a single connection.
pub const MAX_STREAM_IDS: usize = 32768;

const DEFAULT_MAX_IN_FLIGHT: usize = 2048;
const DEFAULT_BUFFER_SIZE: usize = 1024;
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_ORPHANED: usize = 256;

/// General CQL transport trait.
pub trait CqlTransport: Send + Sync {
    /// Assigns a stream id to the frame, schedules it for writing and waits for the response.
    /// Fails with [`Error::Busy`] when all stream ids are taken.
    fn write_frame<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Result<Frame>>;

    /// Checks if the connection is broken (e.g. after read or write errors)
    fn is_broken(&self) -> bool;

    /// Returns associated node address
    fn address(&self) -> SocketAddr;

    /// Number of stream ids in use, including orphaned ones.
    fn in_flight(&self) -> usize;

    /// Number of requests still waiting for a response.
    fn pending_slots(&self) -> usize;

    /// Maximum number of simultaneously used stream ids.
    fn max_in_flight(&self) -> usize;

    /// Last time a request was written.
    fn last_used(&self) -> Instant;

    /// Closes the connection, failing all pending requests.
    fn close(&self);
}

#[cfg(test)]
mock! {
    pub CqlTransport {
    }

    impl CqlTransport for CqlTransport {
        fn write_frame(&self, frame: &Frame) -> BoxFuture<'static, Result<Frame>>;

        fn is_broken(&self) -> bool;

        fn address(&self) -> SocketAddr;

        fn in_flight(&self) -> usize;

        fn pending_slots(&self) -> usize;

        fn max_in_flight(&self) -> usize;

        fn last_used(&self) -> Instant;

        fn close(&self);
    }
}

/// Low-level connection settings.
#[derive(Clone, Copy, Debug)]
pub struct TransportConfig {
    /// Maximum number of concurrent requests, capped at [`MAX_STREAM_IDS`].
    pub max_in_flight: usize,
    /// Capacity of the outgoing request queue.
    pub buffer_size: usize,
    pub tcp_nodelay: bool,
    /// Idle time after which an `OPTIONS` heartbeat is sent. `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,
    /// Time to wait for a heartbeat response before declaring the connection broken.
    pub heartbeat_timeout: Duration,
    /// Number of orphaned stream ids after which the connection is considered broken.
    pub max_orphaned: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            tcp_nodelay: true,
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            max_orphaned: DEFAULT_MAX_ORPHANED,
        }
    }
}

/// Default Tcp transport.
#[derive(Debug)]
pub struct TransportTcp {
    inner: AsyncTransport,
}

impl TransportTcp {
    /// Opens a TCP connection. The connection is not usable for queries until the `STARTUP`
    /// handshake has been performed.
    pub async fn new(
        addr: SocketAddr,
        version: Version,
        keyspace_holder: Arc<KeyspaceHolder>,
        event_handler: Option<mpsc::UnboundedSender<Frame>>,
        error_handler: Option<mpsc::Sender<Error>>,
        config: TransportConfig,
    ) -> Result<TransportTcp> {
        let socket = TcpStream::connect(addr)
            .await
            .map_err(|error| Error::Connect {
                addr,
                reason: error.to_string(),
            })?;

        socket.set_nodelay(config.tcp_nodelay)?;

        let (read_half, write_half) = split(socket);
        Ok(TransportTcp {
            inner: AsyncTransport::new(
                addr,
                version,
                config,
                read_half,
                write_half,
                event_handler,
                error_handler,
                keyspace_holder,
            ),
        })
    }

    /// Protocol version used by this connection.
    #[inline]
    pub fn version(&self) -> Version {
        self.inner.shared.version
    }

    /// Number of stream ids waiting for late responses of cancelled requests.
    #[inline]
    pub fn orphaned(&self) -> usize {
        self.inner.shared.response_handler_map.orphaned()
    }
}

impl CqlTransport for TransportTcp {
    #[inline]
    fn write_frame<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Result<Frame>> {
        self.inner.shared.write_frame(frame).boxed()
    }

    #[inline]
    fn is_broken(&self) -> bool {
        self.inner.shared.is_broken()
    }

    #[inline]
    fn address(&self) -> SocketAddr {
        self.inner.shared.addr
    }

    #[inline]
    fn in_flight(&self) -> usize {
        self.inner.shared.response_handler_map.in_flight()
    }

    #[inline]
    fn pending_slots(&self) -> usize {
        self.inner.shared.response_handler_map.pending_slots()
    }

    #[inline]
    fn max_in_flight(&self) -> usize {
        self.inner.shared.response_handler_map.capacity()
    }

    #[inline]
    fn last_used(&self) -> Instant {
        self.inner.shared.last_used()
    }

    fn close(&self) {
        self.inner.close();
    }
}

#[derive(Debug)]
struct AsyncTransport {
    shared: Arc<TransportShared>,
    processing_handle: JoinHandle<()>,
}

impl Drop for AsyncTransport {
    fn drop(&mut self) {
        self.processing_handle.abort();
    }
}

impl AsyncTransport {
    #[allow(clippy::too_many_arguments)]
    fn new<T: AsyncRead + AsyncWrite + Send + 'static>(
        addr: SocketAddr,
        version: Version,
        config: TransportConfig,
        read_half: ReadHalf<T>,
        write_half: WriteHalf<T>,
        event_handler: Option<mpsc::UnboundedSender<Frame>>,
        error_handler: Option<mpsc::Sender<Error>>,
        keyspace_holder: Arc<KeyspaceHolder>,
    ) -> Self {
        let (write_sender, write_receiver) = mpsc::channel(config.buffer_size.max(1));

        let shared = Arc::new(TransportShared {
            addr,
            version,
            max_orphaned: config.max_orphaned,
            write_sender,
            is_broken: AtomicBool::new(false),
            response_handler_map: ResponseHandlerMap::new(config.max_in_flight),
            created: Instant::now(),
            last_used: AtomicU64::new(0),
        });

        let processing_handle = tokio::spawn(Self::start_processing(
            write_receiver,
            event_handler,
            error_handler,
            read_half,
            write_half,
            keyspace_holder,
            shared.clone(),
            config.heartbeat_interval,
            config.heartbeat_timeout,
        ));

        AsyncTransport {
            shared,
            processing_handle,
        }
    }

    fn close(&self) {
        debug!(addr = %self.shared.addr, "Closing connection.");

        self.shared.mark_broken();
        self.processing_handle.abort();
        self.shared
            .response_handler_map
            .signal_error(&Error::ConnectionClosed(format!(
                "Connection to {} has been closed!",
                self.shared.addr
            )));
    }

    #[allow(clippy::too_many_arguments)]
    async fn start_processing<T: AsyncRead + AsyncWrite>(
        write_receiver: mpsc::Receiver<Request>,
        event_handler: Option<mpsc::UnboundedSender<Frame>>,
        error_handler: Option<mpsc::Sender<Error>>,
        read_half: ReadHalf<T>,
        write_half: WriteHalf<T>,
        keyspace_holder: Arc<KeyspaceHolder>,
        shared: Arc<TransportShared>,
        heartbeat_interval: Option<Duration>,
        heartbeat_timeout: Duration,
    ) {
        let writer = Self::start_writing(write_receiver, BufWriter::new(write_half));
        let reader = Self::start_reading(read_half, event_handler, &keyspace_holder, &shared);
        let heartbeat = Self::start_heartbeat(shared.clone(), heartbeat_interval, heartbeat_timeout);

        let result = tokio::try_join!(writer, reader, heartbeat);
        if let Err(error) = result {
            error!(%error, addr = %shared.addr, "Transport error!");

            shared.mark_broken();
            shared.response_handler_map.signal_error(&error);

            if let Some(error_handler) = error_handler {
                let _ = error_handler.send(error).await;
            }
        }
    }

    async fn start_reading<T: AsyncRead>(
        mut read_half: ReadHalf<T>,
        event_handler: Option<mpsc::UnboundedSender<Frame>>,
        keyspace_holder: &KeyspaceHolder,
        shared: &TransportShared,
    ) -> Result<()> {
        loop {
            let frame = parse_frame(&mut read_half).await?;
            if frame.stream >= 0 {
                // a USE statement changes the keyspace of the whole session
                if frame.opcode == Opcode::Result {
                    Self::track_keyspace(&frame, keyspace_holder)?;
                }

                let stream = frame.stream;
                shared
                    .response_handler_map
                    .send_response(stream, convert_frame_into_result(frame, shared.addr))?;
            } else if frame.stream == EVENT_STREAM_ID {
                if let Some(event_handler) = &event_handler {
                    let _ = event_handler.send(frame);
                }
            }
        }
    }

    fn track_keyspace(frame: &Frame, keyspace_holder: &KeyspaceHolder) -> Result<()> {
        let mut cursor = Cursor::new(frame.body.as_slice());
        if ResultKind::from_cursor(&mut cursor)? == ResultKind::SetKeyspace {
            let set_keyspace = frame.response_body()?.into_set_keyspace().ok_or_else(|| {
                Error::General("SetKeyspace not found with SetKeyspace result kind!".into())
            })?;

            keyspace_holder.update_current_keyspace(set_keyspace.body);
        }

        Ok(())
    }

    async fn start_writing(
        mut write_receiver: mpsc::Receiver<Request>,
        mut write_half: impl AsyncWrite + Unpin,
    ) -> Result<()> {
        while let Some(mut request) = write_receiver.recv().await {
            loop {
                write_half.write_all(&request.data).await?;

                request = match write_receiver.try_recv() {
                    Ok(request) => request,
                    Err(_) => break,
                }
            }

            write_half.flush().await?;
        }

        Ok(())
    }

    async fn start_heartbeat(
        shared: Arc<TransportShared>,
        interval: Option<Duration>,
        timeout: Duration,
    ) -> Result<()> {
        let interval = match interval {
            Some(interval) => interval,
            None => return std::future::pending().await,
        };

        // heartbeats don't count as usage, so idle connections can still be shrunk by pools
        let mut last_heartbeat = Instant::now();

        loop {
            let idle = shared.last_used().max(last_heartbeat).elapsed();
            if idle < interval {
                sleep(interval - idle).await;
                continue;
            }

            trace!(addr = %shared.addr, "Sending heartbeat.");

            let heartbeat = Frame::new_req_options(shared.version);
            last_heartbeat = Instant::now();
            match tokio::time::timeout(timeout, shared.send_frame(&heartbeat, false)).await {
                // a busy connection is obviously alive
                Ok(Ok(_)) | Ok(Err(Error::Busy(_))) => {}
                Ok(Err(error)) => return Err(error),
                Err(_) => {
                    return Err(Error::Timeout(format!(
                        "Heartbeat to {} timed out!",
                        shared.addr
                    )))
                }
            }
        }
    }
}

#[derive(Debug)]
struct TransportShared {
    addr: SocketAddr,
    version: Version,
    max_orphaned: usize,
    write_sender: mpsc::Sender<Request>,
    is_broken: AtomicBool,
    response_handler_map: ResponseHandlerMap,
    created: Instant,
    // milliseconds since `created`
    last_used: AtomicU64,
}

impl TransportShared {
    #[inline]
    fn is_broken(&self) -> bool {
        self.is_broken.load(Ordering::Relaxed)
    }

    #[inline]
    fn mark_broken(&self) {
        self.is_broken.store(true, Ordering::Relaxed);
    }

    #[inline]
    fn last_used(&self) -> Instant {
        self.created + Duration::from_millis(self.last_used.load(Ordering::Relaxed))
    }

    #[inline]
    fn touch(&self) {
        self.last_used
            .store(self.created.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    #[inline]
    async fn write_frame(&self, frame: &Frame) -> Result<Frame> {
        self.send_frame(frame, true).await
    }

    async fn send_frame(&self, frame: &Frame, touch: bool) -> Result<Frame> {
        if self.is_broken() {
            return Err(Error::ConnectionClosed(format!(
                "Connection to {} is broken!",
                self.addr
            )));
        }

        let (sender, receiver) = oneshot::channel();
        let slot = self
            .response_handler_map
            .allocate(sender)
            .ok_or(Error::Busy(self.addr))?;

        let mut guard = SlotGuard {
            shared: self,
            slot,
            written: false,
            completed: false,
        };

        if touch {
            self.touch();
        }

        let data = frame.encode_with_stream(slot.stream_id);
        if self.write_sender.send(Request::new(data)).await.is_err() {
            return Err(Error::ConnectionClosed(
                "Connection closed when writing data!".into(),
            ));
        }

        guard.written = true;

        let response = receiver.await.map_err(|_| {
            Error::ConnectionClosed("Connection closed while waiting for response!".into())
        })?;

        guard.completed = true;
        response
    }
}

// Returns the stream id of a request which did not complete: ids of requests which never reached
// the socket are freed, the rest are orphaned until their response arrives.
struct SlotGuard<'a> {
    shared: &'a TransportShared,
    slot: Slot,
    written: bool,
    completed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }

        let map = &self.shared.response_handler_map;
        if !self.written {
            map.release(self.slot);
            return;
        }

        if let Some(orphaned) = map.orphan(self.slot) {
            trace!(addr = %self.shared.addr, stream_id = self.slot.stream_id, "Orphaned stream.");

            if orphaned > self.shared.max_orphaned && !self.shared.is_broken() {
                warn!(
                    addr = %self.shared.addr,
                    orphaned,
                    "Too many orphaned streams - marking connection as broken."
                );

                self.shared.mark_broken();
            }
        }
    }
}

// Lowest-free-first allocator of stream ids.
#[derive(Debug)]
struct StreamIdAllocator {
    words: Vec<u64>,
    capacity: usize,
    allocated: usize,
}

impl StreamIdAllocator {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_STREAM_IDS);
        StreamIdAllocator {
            words: vec![0; capacity.div_ceil(64)],
            capacity,
            allocated: 0,
        }
    }

    fn allocate(&mut self) -> Option<StreamId> {
        for (index, word) in self.words.iter_mut().enumerate() {
            if *word == u64::MAX {
                continue;
            }

            let bit = (!*word).trailing_zeros() as usize;
            let id = index * 64 + bit;
            if id >= self.capacity {
                return None;
            }

            *word |= 1 << bit;
            self.allocated += 1;

            return Some(id as StreamId);
        }

        None
    }

    fn release(&mut self, stream_id: StreamId) {
        if stream_id < 0 {
            return;
        }

        let id = stream_id as usize;
        if let Some(word) = self.words.get_mut(id / 64) {
            let mask = 1 << (id % 64);
            if *word & mask != 0 {
                *word &= !mask;
                self.allocated -= 1;
            }
        }
    }
}

type ResponseHandler = oneshot::Sender<Result<Frame>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Slot {
    stream_id: StreamId,
    generation: u64,
}

#[derive(Debug)]
struct PendingSlot {
    generation: u64,
    handler: ResponseHandler,
}

#[derive(Debug)]
struct StreamState {
    ids: StreamIdAllocator,
    handlers: FxHashMap<StreamId, PendingSlot>,
    orphaned: FxHashSet<StreamId>,
    next_generation: u64,
}

#[derive(Debug)]
struct ResponseHandlerMap {
    state: Mutex<StreamState>,
}

impl ResponseHandlerMap {
    fn new(max_in_flight: usize) -> Self {
        ResponseHandlerMap {
            state: Mutex::new(StreamState {
                ids: StreamIdAllocator::new(max_in_flight),
                handlers: Default::default(),
                orphaned: Default::default(),
                next_generation: 0,
            }),
        }
    }

    fn allocate(&self, handler: ResponseHandler) -> Option<Slot> {
        let mut state = self.state.lock().unwrap();
        let stream_id = state.ids.allocate()?;

        let generation = state.next_generation;
        state.next_generation += 1;

        state.handlers.insert(
            stream_id,
            PendingSlot {
                generation,
                handler,
            },
        );

        Some(Slot {
            stream_id,
            generation,
        })
    }

    fn send_response(&self, stream_id: StreamId, response: Result<Frame>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.handlers.remove(&stream_id) {
            Some(slot) => {
                state.ids.release(stream_id);
                let _ = slot.handler.send(response);
                Ok(())
            }
            None if state.orphaned.remove(&stream_id) => {
                state.ids.release(stream_id);
                Ok(())
            }
            // unmatched stream - the server is not following the protocol
            None => Err(Error::General(format!("Unmatched stream id: {stream_id}"))),
        }
    }

    fn release(&self, slot: Slot) {
        let mut state = self.state.lock().unwrap();
        if Self::remove_matching(&mut state, slot) {
            state.ids.release(slot.stream_id);
        }
    }

    // returns the number of orphaned ids, if the slot was still pending
    fn orphan(&self, slot: Slot) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        if Self::remove_matching(&mut state, slot) {
            state.orphaned.insert(slot.stream_id);
            Some(state.orphaned.len())
        } else {
            None
        }
    }

    fn remove_matching(state: &mut StreamState, slot: Slot) -> bool {
        let matches = state
            .handlers
            .get(&slot.stream_id)
            .map(|pending| pending.generation == slot.generation)
            .unwrap_or(false);

        if matches {
            state.handlers.remove(&slot.stream_id);
        }

        matches
    }

    fn signal_error(&self, error: &Error) {
        let mut state = self.state.lock().unwrap();
        for (stream_id, slot) in state.handlers.drain().collect::<Vec<_>>() {
            state.ids.release(stream_id);
            let _ = slot
                .handler
                .send(Err(Error::ConnectionClosed(error.to_string())));
        }
    }

    fn in_flight(&self) -> usize {
        self.state.lock().unwrap().ids.allocated
    }

    fn pending_slots(&self) -> usize {
        self.state.lock().unwrap().handlers.len()
    }

    fn orphaned(&self) -> usize {
        self.state.lock().unwrap().orphaned.len()
    }

    fn capacity(&self) -> usize {
        self.state.lock().unwrap().ids.capacity
    }
}

#[derive(Constructor)]
struct Request {
    data: Vec<u8>,
}

//! Matching widget replies to the requests that caused them.
//!
//! The widget protocol carries no request id: a reply is only tagged with
//! the label of the request. A [`ReplyQueue`] keeps the callbacks of
//! outstanding requests for one label in send order and resolves them in
//! arrival order, so it is only correct while the device answers requests
//! of a label in the order it received them.
//!
//! Every callback handed to [`ReplyQueue::issue_request`] runs exactly once:
//! with the parsed reply, with [`WidgetError::SendFailed`] during the call if
//! the send fails, or with [`WidgetError::Stopped`] when the queue is drained
//! or dropped.

use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

use crate::transport::StreamTransport;
use crate::WidgetError;

/// Fixed-size reply structure
pub trait Reply: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Parse from at least `SIZE` bytes
    fn parse(data: &[u8]) -> Self;
}

/// Continuation for one outstanding request
pub type ReplyCallback<R> = Box<dyn FnOnce(Result<R, WidgetError>) + Send>;

/// FIFO of outstanding requests for one reply label
pub struct ReplyQueue<R> {
    label: u8,
    outstanding: VecDeque<ReplyCallback<R>>,
}

impl<R> ReplyQueue<R> {
    /// Create an empty queue for `label`
    pub fn new(label: u8) -> Self {
        Self {
            label,
            outstanding: VecDeque::new(),
        }
    }

    /// Label of the requests and replies
    pub fn label(&self) -> u8 {
        self.label
    }

    /// Number of requests waiting for a reply
    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    /// Whether no request is waiting
    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Fail every outstanding request, oldest first. Returns how many failed.
    pub fn drain(&mut self) -> usize {
        let count = self.outstanding.len();
        while let Some(callback) = self.outstanding.pop_front() {
            callback(Err(WidgetError::Stopped));
        }
        if count > 0 {
            debug!("failed {} outstanding requests for label {}", count, self.label);
        }
        count
    }
}

impl<R: Reply> ReplyQueue<R> {
    /// Send a request and queue `callback` for its reply.
    ///
    /// If the send fails the callback runs before this returns and nothing
    /// is queued.
    pub fn issue_request<T, F>(&mut self, transport: &mut T, payload: &[u8], callback: F)
    where
        T: StreamTransport + ?Sized,
        F: FnOnce(Result<R, WidgetError>) + Send + 'static,
    {
        if transport.send_message(self.label, payload) {
            self.outstanding.push_back(Box::new(callback));
        } else {
            callback(Err(WidgetError::SendFailed(self.label)));
        }
    }

    /// Resolve the oldest outstanding request with a reply.
    ///
    /// A reply with nothing outstanding, or one too short to parse, is
    /// rejected and leaves the queue untouched. A request whose only reply is
    /// short stays queued until a full reply or a drain.
    pub fn on_reply(&mut self, data: &[u8]) -> Result<(), WidgetError> {
        if self.outstanding.is_empty() {
            return Err(WidgetError::Unsolicited(self.label));
        }

        if data.len() < R::SIZE {
            return Err(WidgetError::ShortReplyFrame {
                label: self.label,
                expected: R::SIZE,
                actual: data.len(),
            });
        }

        if let Some(callback) = self.outstanding.pop_front() {
            callback(Ok(R::parse(data)));
        }
        Ok(())
    }
}

impl<R> Drop for ReplyQueue<R> {
    fn drop(&mut self) {
        self.drain();
    }
}

impl<R> fmt::Debug for ReplyQueue<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyQueue")
            .field("label", &self.label)
            .field("outstanding", &self.outstanding.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingTransport;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Pair(u8, u8);

    impl Reply for Pair {
        const SIZE: usize = 2;

        fn parse(data: &[u8]) -> Self {
            Pair(data[0], data[1])
        }
    }

    type Log = Arc<Mutex<Vec<(&'static str, Result<Pair, WidgetError>)>>>;

    fn callback(
        log: &Log,
        name: &'static str,
    ) -> impl FnOnce(Result<Pair, WidgetError>) + Send + 'static {
        let log = Arc::clone(log);
        move |result| log.lock().unwrap().push((name, result))
    }

    #[test]
    fn test_replies_resolve_in_request_order() {
        let log = Log::default();
        let mut transport = RecordingTransport::default();
        let mut queue = ReplyQueue::<Pair>::new(53);

        queue.issue_request(&mut transport, &[0, 0], callback(&log, "r1"));
        queue.issue_request(&mut transport, &[0, 0], callback(&log, "r2"));
        queue.issue_request(&mut transport, &[0, 0], callback(&log, "r3"));
        assert_eq!(queue.len(), 3);
        assert_eq!(transport.sent.len(), 3);
        assert!(transport.sent.iter().all(|(label, _)| *label == 53));

        queue.on_reply(&[1, 10]).unwrap();
        queue.on_reply(&[2, 20]).unwrap();
        queue.on_reply(&[3, 30]).unwrap();
        assert!(queue.is_empty());

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ("r1", Ok(Pair(1, 10))),
                ("r2", Ok(Pair(2, 20))),
                ("r3", Ok(Pair(3, 30))),
            ]
        );
    }

    #[test]
    fn test_send_failure_fails_immediately() {
        let log = Log::default();
        let mut transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        let mut queue = ReplyQueue::<Pair>::new(53);

        queue.issue_request(&mut transport, &[0, 0], callback(&log, "r1"));

        assert!(queue.is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            vec![("r1", Err(WidgetError::SendFailed(53)))]
        );
    }

    #[test]
    fn test_send_failure_leaves_earlier_requests_queued() {
        let log = Log::default();
        let mut transport = RecordingTransport::default();
        let mut queue = ReplyQueue::<Pair>::new(53);

        queue.issue_request(&mut transport, &[], callback(&log, "ok"));
        transport.fail = true;
        queue.issue_request(&mut transport, &[], callback(&log, "failed"));
        assert_eq!(queue.len(), 1);

        queue.on_reply(&[7, 7]).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ("failed", Err(WidgetError::SendFailed(53))),
                ("ok", Ok(Pair(7, 7))),
            ]
        );
    }

    #[test]
    fn test_drain_fails_all_in_order() {
        let log = Log::default();
        let mut transport = RecordingTransport::default();
        let mut queue = ReplyQueue::<Pair>::new(3);

        for name in ["a", "b", "c"] {
            queue.issue_request(&mut transport, &[], callback(&log, name));
        }
        assert_eq!(queue.drain(), 3);
        assert!(queue.is_empty());
        assert_eq!(queue.drain(), 0);

        let names: Vec<_> = log.lock().unwrap().iter().map(|(n, r)| (*n, r.clone())).collect();
        assert_eq!(
            names,
            vec![
                ("a", Err(WidgetError::Stopped)),
                ("b", Err(WidgetError::Stopped)),
                ("c", Err(WidgetError::Stopped)),
            ]
        );
    }

    #[test]
    fn test_drop_drains() {
        let log = Log::default();
        let mut transport = RecordingTransport::default();
        {
            let mut queue = ReplyQueue::<Pair>::new(3);
            queue.issue_request(&mut transport, &[], callback(&log, "pending"));
        }
        assert_eq!(
            *log.lock().unwrap(),
            vec![("pending", Err(WidgetError::Stopped))]
        );
    }

    #[test]
    fn test_short_reply_does_not_pop() {
        let log = Log::default();
        let mut transport = RecordingTransport::default();
        let mut queue = ReplyQueue::<Pair>::new(53);
        queue.issue_request(&mut transport, &[], callback(&log, "r1"));

        assert_eq!(
            queue.on_reply(&[1]),
            Err(WidgetError::ShortReplyFrame {
                label: 53,
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(queue.len(), 1);
        assert!(log.lock().unwrap().is_empty());

        queue.on_reply(&[4, 5, 6]).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![("r1", Ok(Pair(4, 5)))]);
    }

    #[test]
    fn test_unsolicited_reply_discarded() {
        let mut queue = ReplyQueue::<Pair>::new(53);
        assert_eq!(queue.on_reply(&[1, 2]), Err(WidgetError::Unsolicited(53)));
        assert!(queue.is_empty());
    }
}

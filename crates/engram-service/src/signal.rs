//! Process-local operational signal log: a bounded ring of the latest
//! entries plus a broadcast channel for live subscribers. Nothing here
//! persists; loss on process exit is acceptable.

use std::{
	collections::VecDeque,
	sync::{
		Mutex,
		atomic::{AtomicU64, Ordering},
	},
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const SIGNAL_RING_CAPACITY: usize = 50;

const BROADCAST_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
	Info,
	Success,
	Process,
	Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalEntry {
	/// Monotonically increasing within the process.
	pub id: u64,
	/// Epoch millis.
	pub timestamp: i64,
	#[serde(rename = "type")]
	pub kind: SignalKind,
	pub message: String,
}

pub struct SignalLog {
	entries: Mutex<VecDeque<SignalEntry>>,
	next_id: AtomicU64,
	tx: broadcast::Sender<SignalEntry>,
	capacity: usize,
}
impl SignalLog {
	pub fn new() -> Self {
		Self::with_capacity(SIGNAL_RING_CAPACITY)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);

		Self {
			entries: Mutex::new(VecDeque::with_capacity(capacity)),
			next_id: AtomicU64::new(1),
			tx,
			capacity,
		}
	}

	pub fn record(&self, kind: SignalKind, message: impl Into<String>) -> SignalEntry {
		let entry = SignalEntry {
			id: self.next_id.fetch_add(1, Ordering::Relaxed),
			timestamp: crate::now_ms(),
			kind,
			message: message.into(),
		};
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		if entries.len() == self.capacity {
			entries.pop_front();
		}

		entries.push_back(entry.clone());
		drop(entries);

		// No subscribers is fine; entries still land in the ring.
		let _ = self.tx.send(entry.clone());

		entry
	}

	/// Current tail, oldest first.
	pub fn snapshot(&self) -> Vec<SignalEntry> {
		let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		entries.iter().cloned().collect()
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SignalEntry> {
		self.tx.subscribe()
	}
}
impl Default for SignalLog {
	fn default() -> Self {
		Self::new()
	}
}

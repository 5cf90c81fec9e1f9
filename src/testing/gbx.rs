//! Builders for synthetic header-only GBX files

use crate::gbx::{MAP_CLASS_ID, REPLAY_CLASS_ID};
use std::time::Duration;

#[derive(Default)]
struct ChunkWriter {
    out: Vec<u8>,
    lookback_started: bool,
}

impl ChunkWriter {
    fn u8(&mut self, v: u8) -> &mut Self {
        self.out.push(v);
        self
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        self.out.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn string(&mut self, s: &str) -> &mut Self {
        self.u32(s.len() as u32);
        self.out.extend_from_slice(s.as_bytes());
        self
    }

    fn lookback(&mut self, s: &str) -> &mut Self {
        if !self.lookback_started {
            self.lookback_started = true;
            self.u32(3);
        }
        if s.is_empty() {
            return self.u32(u32::MAX);
        }
        self.u32(0x4000_0000).string(s)
    }

    fn time(&mut self, t: Option<Duration>) -> &mut Self {
        self.u32(t.map_or(u32::MAX, |d| d.as_millis() as u32))
    }

    fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }
}

fn file(class_id: u32, chunks: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut user = ChunkWriter::default();
    user.u32(chunks.len() as u32);
    for (id, data) in chunks {
        user.u32(*id).u32(data.len() as u32);
    }
    for (_, data) in chunks {
        user.out.extend_from_slice(data);
    }
    let user = user.finish();

    let mut out = ChunkWriter::default();
    out.out.extend_from_slice(b"GBX");
    out.out.extend_from_slice(&6u16.to_le_bytes());
    out.out.extend_from_slice(b"BUCR");
    out.u32(class_id).u32(user.len() as u32);
    out.out.extend_from_slice(&user);
    // node counts of the (absent) body
    out.u32(0).u32(0);
    out.finish()
}

/// A map header with medal times, mode and collection
#[derive(Debug, Clone)]
pub struct MapFixture {
    pub uid: String,
    pub name: String,
    pub collection: String,
    pub author: String,
    pub author_time: Option<Duration>,
    pub gold_time: Option<Duration>,
    pub mode: u32,
}

impl MapFixture {
    pub fn new(uid: &str, name: &str) -> Self {
        Self {
            uid: uid.to_string(),
            name: name.to_string(),
            collection: "Stadium".to_string(),
            author: "nadeo".to_string(),
            author_time: Some(Duration::from_secs(30)),
            gold_time: Some(Duration::from_secs(33)),
            mode: 0,
        }
    }

    pub fn collection(mut self, collection: &str) -> Self {
        self.collection = collection.to_string();
        self
    }

    pub fn medals(mut self, author: Duration, gold: Duration) -> Self {
        self.author_time = Some(author);
        self.gold_time = Some(gold);
        self
    }

    pub fn no_medals(mut self) -> Self {
        self.author_time = None;
        self.gold_time = None;
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let silver = self.gold_time.map(|g| g + g / 5);
        let bronze = self.gold_time.map(|g| g + g / 2);

        let mut description = ChunkWriter::default();
        description
            .u8(13)
            .u32(0)
            .time(bronze)
            .time(silver)
            .time(self.gold_time)
            .time(self.author_time)
            .u32(1200)
            .u32(0)
            .u32(self.mode)
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(3)
            .u32(1);

        let mut common = ChunkWriter::default();
        common
            .u8(0)
            .lookback(&self.uid)
            .lookback(&self.collection)
            .lookback(&self.author)
            .string(&self.name);

        file(
            MAP_CLASS_ID,
            &[
                (0x0304_3002, description.finish()),
                (0x0304_3003, common.finish()),
            ],
        )
    }
}

/// A replay header for a given map and finish time
#[derive(Debug, Clone)]
pub struct ReplayFixture {
    pub map_uid: String,
    pub time: Duration,
    pub nickname: String,
    pub login: String,
}

impl ReplayFixture {
    pub fn new(map_uid: &str, time: Duration) -> Self {
        Self {
            map_uid: map_uid.to_string(),
            time,
            nickname: "Player".to_string(),
            login: "player".to_string(),
        }
    }

    pub fn player(mut self, nickname: &str, login: &str) -> Self {
        self.nickname = nickname.to_string();
        self.login = login.to_string();
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut chunk = ChunkWriter::default();
        chunk
            .u32(6)
            .lookback(&self.map_uid)
            .lookback("Stadium")
            .lookback("nadeo")
            .time(Some(self.time))
            .string(&self.nickname)
            .string(&self.login);

        file(REPLAY_CLASS_ID, &[(0x0309_3000, chunk.finish())])
    }
}

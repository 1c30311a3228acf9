//! Standard security handler, revision 3: RC4 under a 128-bit file key.
//!
//! The O and U entries come from the padding-and-MD5 key derivation of the
//! PDF standard; strings and streams are then enciphered per object.
//! RC4 is length-preserving, so stream dictionaries written before the
//! encryption pass stay valid. The file key is derived from the document
//! identifier, which the writer computes from the plaintext body, keeping
//! encrypted output as deterministic as plain output.

const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

// 128-bit keys; also the MD5 digest width.
const KEY_LEN: usize = 16;

/// What a viewer may let the user do once the file is open. Everything is
/// allowed by default; each flag maps to one user-access bit of the
/// encryption dictionary's P entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub print: bool,
    pub modify: bool,
    pub copy: bool,
    pub annotate: bool,
    pub fill_forms: bool,
    pub extract_accessibility: bool,
    pub assemble: bool,
    pub print_high_res: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            print: true,
            modify: true,
            copy: true,
            annotate: true,
            fill_forms: true,
            extract_accessibility: true,
            assemble: true,
            print_high_res: true,
        }
    }
}

impl Permissions {
    /// The signed 32-bit P entry. Reserved bits 7, 8, and 13..32 must be
    /// set, so the all-permissions value is -4.
    pub(crate) fn to_p(self) -> i32 {
        let mut bits: u32 = 0xFFFF_F0C0;
        let flags = [
            (self.print, 2),
            (self.modify, 3),
            (self.copy, 4),
            (self.annotate, 5),
            (self.fill_forms, 8),
            (self.extract_accessibility, 9),
            (self.assemble, 10),
            (self.print_high_res, 11),
        ];
        for (allowed, bit) in flags {
            if allowed {
                bits |= 1 << bit;
            }
        }
        bits as i32
    }
}

/// Encryption settings for a document. An empty owner password falls back
/// to the user password, as the original interface does.
#[derive(Debug, Clone, Default)]
pub struct Encryption {
    pub owner_password: String,
    pub user_password: String,
    pub permissions: Permissions,
}

pub(crate) struct SecurityHandler {
    key: [u8; KEY_LEN],
    o: [u8; 32],
    u: [u8; 32],
    p: i32,
}

impl SecurityHandler {
    pub(crate) fn new(settings: &Encryption, file_id: &[u8; 16]) -> Self {
        let p = settings.permissions.to_p();
        let owner = if settings.owner_password.is_empty() {
            &settings.user_password
        } else {
            &settings.owner_password
        };
        let o = owner_value(owner.as_bytes(), settings.user_password.as_bytes());
        let key = file_key(settings.user_password.as_bytes(), &o, p, file_id);
        let u = user_value(&key, file_id);
        Self { key, o, u, p }
    }

    pub(crate) fn o(&self) -> &[u8; 32] {
        &self.o
    }

    pub(crate) fn u(&self) -> &[u8; 32] {
        &self.u
    }

    pub(crate) fn p(&self) -> i32 {
        self.p
    }

    /// Per-object encryption: the file key is extended with the low bytes
    /// of the object number (generation is always zero here), hashed, and
    /// truncated to the cipher key.
    pub(crate) fn encrypt(&self, obj_num: u32, data: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(KEY_LEN + 5);
        key.extend_from_slice(&self.key);
        key.extend_from_slice(&obj_num.to_le_bytes()[..3]);
        key.extend_from_slice(&[0, 0]);
        let hash = md5(&key);
        let mut out = data.to_vec();
        Rc4::new(&hash[..KEY_LEN.min(self.key.len() + 5)]).apply(&mut out);
        out
    }
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let n = password.len().min(32);
    out[..n].copy_from_slice(&password[..n]);
    out[n..].copy_from_slice(&PADDING[..32 - n]);
    out
}

/// The O entry: the padded user password enciphered under a key derived
/// from the owner password, with the 19 xor-variant rounds of revision 3.
fn owner_value(owner: &[u8], user: &[u8]) -> [u8; 32] {
    let mut hash = md5(&pad_password(owner));
    for _ in 0..50 {
        hash = md5(&hash);
    }
    let key = &hash[..KEY_LEN];
    let mut out = pad_password(user);
    Rc4::new(key).apply(&mut out);
    for round in 1..=19u8 {
        let variant: Vec<u8> = key.iter().map(|b| b ^ round).collect();
        Rc4::new(&variant).apply(&mut out);
    }
    out
}

/// The file key: MD5 over padded user password, O, P (low byte first), and
/// the first document identifier, then 50 re-hash rounds.
fn file_key(user: &[u8], o: &[u8; 32], p: i32, file_id: &[u8; 16]) -> [u8; KEY_LEN] {
    let mut input = Vec::with_capacity(84);
    input.extend_from_slice(&pad_password(user));
    input.extend_from_slice(o);
    input.extend_from_slice(&(p as u32).to_le_bytes());
    input.extend_from_slice(file_id);
    let mut hash = md5(&input);
    for _ in 0..50 {
        hash = md5(&hash[..KEY_LEN]);
    }
    hash
}

/// The U entry: MD5 of the padding string and the document identifier,
/// enciphered like the O entry; the second half is zero padding.
fn user_value(key: &[u8; KEY_LEN], file_id: &[u8; 16]) -> [u8; 32] {
    let mut input = Vec::with_capacity(48);
    input.extend_from_slice(&PADDING);
    input.extend_from_slice(file_id);
    let mut block = md5(&input);
    Rc4::new(key).apply(&mut block);
    for round in 1..=19u8 {
        let variant: Vec<u8> = key.iter().map(|b| b ^ round).collect();
        Rc4::new(&variant).apply(&mut block);
    }
    let mut out = [0u8; 32];
    out[..KEY_LEN].copy_from_slice(&block);
    out
}

struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (index, slot) in s.iter_mut().enumerate() {
            *slot = index as u8;
        }
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        Self { s, i: 0, j: 0 }
    }

    fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let sum = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *byte ^= self.s[sum as usize];
        }
    }
}

const MD5_SHIFTS: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9,
    14, 20, 5, 9, 14, 20, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 6, 10, 15,
    21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

const MD5_SINES: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

// The key-derivation algorithms are defined over MD5; sha2 stays the
// hash for everything outside this module.
fn md5(data: &[u8]) -> [u8; 16] {
    let mut message = data.to_vec();
    let bit_len = (data.len() as u64).wrapping_mul(8);
    message.push(0x80);
    while message.len() % 64 != 56 {
        message.push(0);
    }
    message.extend_from_slice(&bit_len.to_le_bytes());

    let mut state = [0x6745_2301u32, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476];
    for block in message.chunks_exact(64) {
        let mut words = [0u32; 16];
        for (word, bytes) in words.iter_mut().zip(block.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        let [mut a, mut b, mut c, mut d] = state;
        for i in 0..64 {
            let (mix, g) = match i / 16 {
                0 => ((b & c) | (!b & d), i),
                1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                2 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };
            let rotated = a
                .wrapping_add(mix)
                .wrapping_add(MD5_SINES[i])
                .wrapping_add(words[g])
                .rotate_left(MD5_SHIFTS[i]);
            a = d;
            d = c;
            c = b;
            b = b.wrapping_add(rotated);
        }
        for (slot, value) in state.iter_mut().zip([a, b, c, d]) {
            *slot = slot.wrapping_add(value);
        }
    }

    let mut out = [0u8; 16];
    for (chunk, word) in out.chunks_exact_mut(4).zip(state) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    out
}

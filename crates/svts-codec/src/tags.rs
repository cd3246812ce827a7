//! BER tag constants for the SV and GOOSE tag trees (spec component B).

/// `savPdu`, application class 0, constructed.
pub const SAV_PDU: u8 = 0x60;
/// `noASDU`.
pub const NO_ASDU: u8 = 0x80;
/// `seqOfASDU`.
pub const SEQ_OF_ASDU: u8 = 0xA2;
/// `ASDU`.
pub const ASDU: u8 = 0x30;
/// `svID`.
pub const SV_ID: u8 = 0x80;
/// `datSet`.
pub const SV_DAT_SET: u8 = 0x81;
/// `smpCnt`, 2-byte unsigned.
pub const SMP_CNT: u8 = 0x82;
/// `confRev`, 4-byte unsigned.
pub const SV_CONF_REV: u8 = 0x83;
/// `refrTm`.
pub const REFR_TM: u8 = 0x84;
/// `smpSynch`, 1 byte.
pub const SMP_SYNCH: u8 = 0x85;
/// `smpRate`, 2-byte unsigned.
pub const SMP_RATE: u8 = 0x86;
/// `seqData`, octet string.
pub const SEQ_DATA: u8 = 0x87;

/// `gse:PDU`.
pub const GOOSE_PDU: u8 = 0x61;
/// `gocbRef`.
pub const GOCB_REF: u8 = 0x80;
/// `timeAllowedToLive`.
pub const TIME_ALLOWED_TO_LIVE: u8 = 0x81;
/// `datSet` (GOOSE).
pub const GOOSE_DAT_SET: u8 = 0x82;
/// `goID`.
pub const GO_ID: u8 = 0x83;
/// `t`.
pub const GOOSE_T: u8 = 0x84;
/// `stNum`.
pub const ST_NUM: u8 = 0x85;
/// `sqNum`.
pub const SQ_NUM: u8 = 0x86;
/// `test`.
pub const GOOSE_TEST: u8 = 0x87;
/// `confRev` (GOOSE).
pub const GOOSE_CONF_REV: u8 = 0x88;
/// `ndsCom`.
pub const NDS_COM: u8 = 0x89;
/// `numDatSetEntries`.
pub const NUM_DAT_SET_ENTRIES: u8 = 0x8A;
/// `allData`.
pub const ALL_DATA: u8 = 0xAB;

/// Data primitive: boolean.
pub const DATA_BOOLEAN: u8 = 0x83;
/// Data primitive: signed integer.
pub const DATA_INTEGER: u8 = 0x85;
/// Data primitive: unsigned integer.
pub const DATA_UNSIGNED: u8 = 0x86;
/// Data primitive: float.
pub const DATA_FLOAT: u8 = 0x87;
/// Data primitive: UTF-8 string.
pub const DATA_UTF8_STRING: u8 = 0x8A;
/// Data primitive: bit string.
pub const DATA_BIT_STRING: u8 = 0x84;

/// EtherType for IEC 61850-9-2 Sampled Values.
pub const ETHERTYPE_SV: u16 = 0x88BA;
/// EtherType for GOOSE.
pub const ETHERTYPE_GOOSE: u16 = 0x88B8;
/// EtherType for an 802.1Q VLAN tag.
pub const ETHERTYPE_VLAN: u16 = 0x8100;

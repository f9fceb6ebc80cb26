pub const ECHO_REQUEST_V4: u8 = 8;
pub const ECHO_REPLY_V4: u8 = 0;
pub const ECHO_REQUEST_V6: u8 = 128;
pub const ECHO_REPLY_V6: u8 = 129;

const ECHO_HDR_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    pub identifier: u16,
    pub sequence: u16,
}

/// Internet checksum (RFC 1071) over the whole buffer.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]) as u32,
            [hi] => u16::from_be_bytes([*hi, 0]) as u32,
            _ => 0,
        })
        .sum();

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

pub fn echo_request(v6: bool, identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut pkt = vec![0u8; ECHO_HDR_LEN + payload.len()];
    pkt[0] = if v6 { ECHO_REQUEST_V6 } else { ECHO_REQUEST_V4 };
    pkt[1] = 0;
    pkt[4..6].copy_from_slice(&identifier.to_be_bytes());
    pkt[6..8].copy_from_slice(&sequence.to_be_bytes());
    pkt[ECHO_HDR_LEN..].copy_from_slice(payload);

    // The kernel fills in the ICMPv6 checksum, it needs the pseudo-header.
    if !v6 {
        let csm = checksum(&pkt);
        pkt[2..4].copy_from_slice(&csm.to_be_bytes());
    }
    pkt
}

/// Parses an echo reply. Some platforms hand back the IPv4 header on
/// datagram ICMP sockets, so it is skipped when present.
pub fn parse_echo_reply(buf: &[u8], v6: bool) -> Option<EchoReply> {
    let icmp = if !v6 && buf.first().map(|b| b >> 4) == Some(4) {
        let ihl = ((buf[0] & 0x0f) as usize) * 4;
        buf.get(ihl..)?
    } else {
        buf
    };

    if icmp.len() < ECHO_HDR_LEN {
        return None;
    }
    let expected = if v6 { ECHO_REPLY_V6 } else { ECHO_REPLY_V4 };
    if icmp[0] != expected || icmp[1] != 0 {
        return None;
    }

    Some(EchoReply {
        identifier: u16::from_be_bytes([icmp[4], icmp[5]]),
        sequence: u16::from_be_bytes([icmp[6], icmp[7]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_request_verifies_to_zero() {
        let pkt = echo_request(false, 0x1234, 7, b"netprobe");
        assert_eq!(checksum(&pkt), 0);
    }

    #[test]
    fn odd_length_checksum() {
        assert_eq!(checksum(&[0xff]), !0xff00);
    }

    #[test]
    fn v6_request_leaves_checksum_to_kernel() {
        let pkt = echo_request(true, 1, 2, &[]);
        assert_eq!(pkt[0], ECHO_REQUEST_V6);
        assert_eq!(&pkt[2..4], &[0, 0]);
    }

    #[test]
    fn parses_bare_reply() {
        let mut pkt = echo_request(false, 0xbeef, 3, b"x");
        pkt[0] = ECHO_REPLY_V4;
        assert_eq!(
            parse_echo_reply(&pkt, false),
            Some(EchoReply { identifier: 0xbeef, sequence: 3 })
        );
    }

    #[test]
    fn skips_ipv4_header() {
        let mut reply = echo_request(false, 9, 1, &[]);
        reply[0] = ECHO_REPLY_V4;
        let mut pkt = vec![0x45];
        pkt.extend_from_slice(&[0u8; 19]);
        pkt.extend_from_slice(&reply);

        assert_eq!(parse_echo_reply(&pkt, false).map(|r| r.sequence), Some(1));
    }

    #[test]
    fn ignores_requests_and_short_buffers() {
        let pkt = echo_request(true, 1, 1, &[]);
        assert_eq!(parse_echo_reply(&pkt, true), None);
        assert_eq!(parse_echo_reply(&[ECHO_REPLY_V6, 0, 0], true), None);
    }
}

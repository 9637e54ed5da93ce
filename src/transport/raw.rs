//! `AF_PACKET` raw socket bound to the AVDECC ethertype (Linux)

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::ffi::CString;
use std::io;
use std::mem::{self, MaybeUninit};
use std::os::fd::AsRawFd;
use std::time::Duration;

use super::{encode_frame, Frame, Transport, ETHERNET_HEADER_LEN, MAX_FRAME_LEN};
use crate::error::TransportError;
use crate::protocol::{MacAddress, ADP_ACMP_MULTICAST, AVTP_ETHERTYPE};

/// Raw Ethernet socket on one interface
pub struct RawSocket {
    socket: Socket,
    interface: String,
    mac: MacAddress,
}

impl RawSocket {
    /// Open, bind and join the ADP/ACMP multicast group on `interface`
    ///
    /// Needs `CAP_NET_RAW`.
    pub fn open(interface: &str) -> Result<Self, TransportError> {
        let name = CString::new(interface).map_err(|_| TransportError::InterfaceNotFound(interface.to_string()))?;
        let if_index = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if if_index == 0 {
            return Err(TransportError::InterfaceNotFound(interface.to_string()));
        }

        let protocol = Protocol::from(i32::from(AVTP_ETHERTYPE.to_be()));
        let socket = Socket::new(Domain::PACKET, Type::RAW, Some(protocol))
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let link = libc::sockaddr_ll {
            sll_family: libc::AF_PACKET as u16,
            sll_protocol: AVTP_ETHERTYPE.to_be(),
            sll_ifindex: if_index as i32,
            sll_hatype: 0,
            sll_pkttype: 0,
            sll_halen: 6,
            sll_addr: [0; 8],
        };
        // SAFETY: sockaddr_storage is large enough and suitably aligned for sockaddr_ll
        unsafe { std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_ll, link) };
        let addr = unsafe { SockAddr::new(storage, mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t) };
        socket
            .bind(&addr)
            .map_err(|e| TransportError::OpenFailed(format!("bind {}: {}", interface, e)))?;

        let raw = Self {
            socket,
            interface: interface.to_string(),
            mac: MacAddress::ZERO,
        };
        let mac = raw.query_mac()?;
        raw.join_multicast(if_index as i32, ADP_ACMP_MULTICAST)?;

        tracing::info!("Opened raw socket on {} ({}), ifindex {}", interface, mac, if_index);
        Ok(Self { mac, ..raw })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn ifreq(&self) -> libc::ifreq {
        // SAFETY: ifreq is plain old data
        let mut req: libc::ifreq = unsafe { mem::zeroed() };
        let name = self.interface.as_bytes();
        let len = name.len().min(libc::IFNAMSIZ - 1);
        for (dst, src) in req.ifr_name.iter_mut().zip(&name[..len]) {
            *dst = *src as libc::c_char;
        }
        req
    }

    fn query_mac(&self) -> Result<MacAddress, TransportError> {
        let mut req = self.ifreq();
        let rc = unsafe {
            libc::ioctl(self.socket.as_raw_fd(), libc::SIOCGIFHWADDR as _, &mut req as *mut libc::ifreq)
        };
        if rc < 0 {
            return Err(TransportError::OpenFailed(format!(
                "SIOCGIFHWADDR {}: {}",
                self.interface,
                io::Error::last_os_error()
            )));
        }
        // SAFETY: SIOCGIFHWADDR fills the hwaddr member
        let data = unsafe { req.ifr_ifru.ifru_hwaddr.sa_data };
        let mut mac = [0u8; 6];
        for (dst, src) in mac.iter_mut().zip(data.iter()) {
            *dst = *src as u8;
        }
        Ok(MacAddress(mac))
    }

    fn join_multicast(&self, if_index: i32, group: MacAddress) -> Result<(), TransportError> {
        let mut address = [0u8; 8];
        address[..6].copy_from_slice(&group.0);
        let mreq = libc::packet_mreq {
            mr_ifindex: if_index,
            mr_type: libc::PACKET_MR_MULTICAST as u16,
            mr_alen: 6,
            mr_address: address,
        };
        let rc = unsafe {
            libc::setsockopt(
                self.socket.as_raw_fd(),
                libc::SOL_PACKET,
                libc::PACKET_ADD_MEMBERSHIP,
                &mreq as *const libc::packet_mreq as *const libc::c_void,
                mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(TransportError::OpenFailed(format!(
                "PACKET_ADD_MEMBERSHIP {}: {}",
                group,
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

impl Transport for RawSocket {
    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    fn send_frame(&self, dest: MacAddress, ethertype: u16, payload: &[u8]) -> Result<usize, TransportError> {
        let frame = encode_frame(dest, self.mac, ethertype, payload);
        if frame.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(frame.len()));
        }
        let sent = self
            .socket
            .send(&frame)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(sent.saturating_sub(ETHERNET_HEADER_LEN).min(payload.len()))
    }

    fn receive_frame(&self, timeout: Duration) -> Result<Option<Frame>, TransportError> {
        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

        let mut buf = [MaybeUninit::<u8>::uninit(); MAX_FRAME_LEN];
        match self.socket.recv_from(&mut buf) {
            Ok((len, addr)) => {
                // SAFETY: recv_from initialized the first `len` bytes
                let data = unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, len) };
                // SAFETY: packet sockets report a sockaddr_ll source
                let pkttype = unsafe { (*(addr.as_ptr() as *const libc::sockaddr_ll)).sll_pkttype };
                if pkttype == libc::PACKET_OUTGOING as u8 {
                    return Ok(None);
                }
                Ok(Frame::parse(data))
            }
            Err(e) if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ) =>
            {
                Ok(None)
            }
            Err(e) => Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }

    fn link_is_up(&self) -> Result<bool, TransportError> {
        let mut req = self.ifreq();
        let rc = unsafe {
            libc::ioctl(self.socket.as_raw_fd(), libc::SIOCGIFFLAGS as _, &mut req as *mut libc::ifreq)
        };
        if rc < 0 {
            return Err(TransportError::LinkQueryFailed(io::Error::last_os_error().to_string()));
        }
        // SAFETY: SIOCGIFFLAGS fills the flags member
        let flags = i32::from(unsafe { req.ifr_ifru.ifru_flags });
        Ok(flags & libc::IFF_UP != 0 && flags & libc::IFF_RUNNING != 0)
    }
}

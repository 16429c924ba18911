//! Classifier expression to program translation
//!
//! Each predicate compiles to a short block of loads and conditional jumps
//! with two outgoing edges, true and false. Boolean combinators never emit
//! code of their own: `and`/`or` wire the edges for short-circuit
//! evaluation and `not` swaps them. Jump targets are symbolic labels
//! resolved to relative offsets once the whole tree has been emitted, all
//! of them forward.
//!
//! Every predicate is emitted twice, once for the untagged frame layout and
//! once shifted by four bytes under a single 802.1Q tag, dispatched on the
//! ethertype at offset 12. Port predicates exclude IP fragments and index
//! the transport header through the IHL so IPv4 options cannot misalign the
//! port loads.

use crate::expr::{self, Direction, Expr, Proto};
use crate::program::{
    Filter, Instruction, BPF_ABS, BPF_B, BPF_H, BPF_IND, BPF_JEQ, BPF_JMP, BPF_JSET, BPF_K,
    BPF_LD, BPF_LDX, BPF_MSH, BPF_RET,
};
use pktkit_core::types::{ethertypes, ipproto};
use pktkit_core::{Error, LayerType, Result};
use tracing::debug;

/// Offset of the ethertype within an untagged Ethernet header
const ETHERTYPE_OFFSET: u32 = 12;

/// Offset of the network header within an untagged Ethernet frame
const NET_OFFSET: u32 = 14;

/// Bytes a single 802.1Q tag shifts everything after the ethertype
const VLAN_SHIFT: u32 = 4;

/// Fragment-offset bits of the IPv4 flags/offset half-word
const FRAGMENT_MASK: u32 = 0x1fff;

/// RET value for accepted frames
const ACCEPT: u32 = 65535;

/// Compile a classifier expression for the given link type.
pub(crate) fn compile(expression: &str, link: LayerType) -> Result<Filter> {
    let ast = expr::parse(expression)?;

    let mut gen = CodeGen::new(link);
    let accept = gen.new_label();
    let reject = gen.new_label();
    gen.emit(&ast, accept, reject)?;
    gen.bind(accept);
    gen.stmt(BPF_RET | BPF_K, ACCEPT);
    gen.bind(reject);
    gen.stmt(BPF_RET | BPF_K, 0);

    let program = gen.link()?;
    debug!(expression, instructions = program.len(), "compiled filter");
    Ok(Filter::new(program, link))
}

#[derive(Debug, Clone, Copy)]
struct Label(usize);

enum Pending {
    Stmt { code: u16, k: u32 },
    Jump { code: u16, k: u32, t: Label, f: Label },
}

struct CodeGen {
    link: LayerType,
    insns: Vec<Pending>,
    labels: Vec<Option<usize>>,
}

impl CodeGen {
    fn new(link: LayerType) -> Self {
        CodeGen {
            link,
            insns: Vec::new(),
            labels: Vec::new(),
        }
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the next emitted instruction
    fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.insns.len());
    }

    fn stmt(&mut self, code: u16, k: u32) {
        self.insns.push(Pending::Stmt { code, k });
    }

    fn jump(&mut self, code: u16, k: u32, t: Label, f: Label) {
        self.insns.push(Pending::Jump { code, k, t, f });
    }

    fn emit(&mut self, expr: &Expr, t: Label, f: Label) -> Result<()> {
        match expr {
            Expr::Or(lhs, rhs) => {
                let mid = self.new_label();
                self.emit(lhs, t, mid)?;
                self.bind(mid);
                self.emit(rhs, t, f)
            }
            Expr::And(lhs, rhs) => {
                let mid = self.new_label();
                self.emit(lhs, mid, f)?;
                self.bind(mid);
                self.emit(rhs, t, f)
            }
            Expr::Not(inner) => self.emit(inner, f, t),
            Expr::Proto(proto) => self.emit_proto(*proto, t, f),
            Expr::Port { direction, port } => self.emit_port(*direction, *port, t, f),
        }
    }

    fn check_link(&self, predicate: &str) -> Result<()> {
        if self.link != LayerType::Eth {
            return Err(Error::FilterLinkType {
                predicate: predicate.to_string(),
                link: self.link,
            });
        }
        Ok(())
    }

    fn emit_proto(&mut self, proto: Proto, t: Label, f: Label) -> Result<()> {
        self.check_link(proto.name())?;
        self.stmt(BPF_LD | BPF_H | BPF_ABS, ETHERTYPE_OFFSET);

        match proto {
            Proto::Vlan => {
                self.jump(BPF_JMP | BPF_JEQ | BPF_K, ethertypes::DOT1Q as u32, t, f);
            }
            Proto::Arp | Proto::Ip => {
                let ethertype = match proto {
                    Proto::Arp => ethertypes::ARP,
                    _ => ethertypes::IPV4,
                } as u32;

                let check_tag = self.new_label();
                let tagged = self.new_label();
                self.jump(BPF_JMP | BPF_JEQ | BPF_K, ethertype, t, check_tag);
                self.bind(check_tag);
                self.jump(BPF_JMP | BPF_JEQ | BPF_K, ethertypes::DOT1Q as u32, tagged, f);
                self.bind(tagged);
                self.stmt(BPF_LD | BPF_H | BPF_ABS, ETHERTYPE_OFFSET + VLAN_SHIFT);
                self.jump(BPF_JMP | BPF_JEQ | BPF_K, ethertype, t, f);
            }
            Proto::Tcp | Proto::Udp => {
                let protocol = match proto {
                    Proto::Tcp => ipproto::TCP,
                    _ => ipproto::UDP,
                } as u32;

                let untagged = self.new_label();
                let tagged = self.new_label();
                self.jump(BPF_JMP | BPF_JEQ | BPF_K, ethertypes::DOT1Q as u32, tagged, untagged);
                self.bind(untagged);
                self.emit_ip_protocol(0, protocol, t, f);
                self.bind(tagged);
                self.stmt(BPF_LD | BPF_H | BPF_ABS, ETHERTYPE_OFFSET + VLAN_SHIFT);
                self.emit_ip_protocol(VLAN_SHIFT, protocol, t, f);
            }
        }
        Ok(())
    }

    /// Test the IPv4 protocol byte. Entered with the ethertype at
    /// `12 + shift` already in the accumulator.
    fn emit_ip_protocol(&mut self, shift: u32, protocol: u32, t: Label, f: Label) {
        let is_ip = self.new_label();
        self.jump(BPF_JMP | BPF_JEQ | BPF_K, ethertypes::IPV4 as u32, is_ip, f);
        self.bind(is_ip);
        self.stmt(BPF_LD | BPF_B | BPF_ABS, NET_OFFSET + shift + 9);
        self.jump(BPF_JMP | BPF_JEQ | BPF_K, protocol, t, f);
    }

    fn emit_port(&mut self, direction: Option<Direction>, port: u16, t: Label, f: Label) -> Result<()> {
        self.check_link("port")?;
        self.stmt(BPF_LD | BPF_H | BPF_ABS, ETHERTYPE_OFFSET);

        let untagged = self.new_label();
        let tagged = self.new_label();
        self.jump(BPF_JMP | BPF_JEQ | BPF_K, ethertypes::DOT1Q as u32, tagged, untagged);
        self.bind(untagged);
        self.emit_port_path(0, direction, port, t, f);
        self.bind(tagged);
        self.stmt(BPF_LD | BPF_H | BPF_ABS, ETHERTYPE_OFFSET + VLAN_SHIFT);
        self.emit_port_path(VLAN_SHIFT, direction, port, t, f);
        Ok(())
    }

    /// Test the transport ports. Entered with the ethertype at `12 + shift`
    /// already in the accumulator.
    fn emit_port_path(
        &mut self,
        shift: u32,
        direction: Option<Direction>,
        port: u16,
        t: Label,
        f: Label,
    ) {
        let port = port as u32;

        let is_ip = self.new_label();
        self.jump(BPF_JMP | BPF_JEQ | BPF_K, ethertypes::IPV4 as u32, is_ip, f);
        self.bind(is_ip);

        self.stmt(BPF_LD | BPF_B | BPF_ABS, NET_OFFSET + shift + 9);
        let transport = self.new_label();
        let not_tcp = self.new_label();
        self.jump(BPF_JMP | BPF_JEQ | BPF_K, ipproto::TCP as u32, transport, not_tcp);
        self.bind(not_tcp);
        self.jump(BPF_JMP | BPF_JEQ | BPF_K, ipproto::UDP as u32, transport, f);
        self.bind(transport);

        // Ports only exist in the first fragment.
        self.stmt(BPF_LD | BPF_H | BPF_ABS, NET_OFFSET + shift + 6);
        let unfragmented = self.new_label();
        self.jump(BPF_JMP | BPF_JSET | BPF_K, FRAGMENT_MASK, f, unfragmented);
        self.bind(unfragmented);

        // X = IP header length, so options cannot misalign the port loads.
        self.stmt(BPF_LDX | BPF_B | BPF_MSH, NET_OFFSET + shift);
        match direction {
            None => {
                let check_dst = self.new_label();
                self.stmt(BPF_LD | BPF_H | BPF_IND, NET_OFFSET + shift);
                self.jump(BPF_JMP | BPF_JEQ | BPF_K, port, t, check_dst);
                self.bind(check_dst);
                self.stmt(BPF_LD | BPF_H | BPF_IND, NET_OFFSET + shift + 2);
                self.jump(BPF_JMP | BPF_JEQ | BPF_K, port, t, f);
            }
            Some(Direction::Source) => {
                self.stmt(BPF_LD | BPF_H | BPF_IND, NET_OFFSET + shift);
                self.jump(BPF_JMP | BPF_JEQ | BPF_K, port, t, f);
            }
            Some(Direction::Destination) => {
                self.stmt(BPF_LD | BPF_H | BPF_IND, NET_OFFSET + shift + 2);
                self.jump(BPF_JMP | BPF_JEQ | BPF_K, port, t, f);
            }
        }
    }

    /// Resolve labels to relative jump offsets and produce the program.
    fn link(self) -> Result<Vec<Instruction>> {
        let mut program = Vec::with_capacity(self.insns.len());

        for (pc, pending) in self.insns.iter().enumerate() {
            let insn = match *pending {
                Pending::Stmt { code, k } => Instruction::new(code, 0, 0, k),
                Pending::Jump { code, k, t, f } => {
                    let jt = self.offset(pc, t)?;
                    let jf = self.offset(pc, f)?;
                    Instruction::new(code, jt, jf, k)
                }
            };
            program.push(insn);
        }

        Ok(program)
    }

    fn offset(&self, pc: usize, label: Label) -> Result<u8> {
        let target = self.labels[label.0]
            .ok_or_else(|| Error::FilterTooComplex("unresolved jump target".into()))?;
        let delta = target
            .checked_sub(pc + 1)
            .ok_or_else(|| Error::FilterTooComplex("backward jump".into()))?;
        u8::try_from(delta)
            .map_err(|_| Error::FilterTooComplex("jump distance exceeds 255 instructions".into()))
    }
}

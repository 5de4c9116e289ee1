
// External data representation, the serialization layer underneath ONC RPC
pub mod xdr;

// Remote procedure call, enough of the client side to carry VXI-11 over TCP
pub mod rpc;

// A protocol using RPC that's meant to communicate with LAN-attached instruments
pub mod vxi11;

// USB Test and Measurement Class, the equivalent transport for USB-attached instruments
pub mod usbtmc;

// VISA-style resource names and the rules for picking one instrument among many
pub mod resource;

// Module for devices reachable through one of the transports above
pub mod devices;

// Hand a saved capture to the operating system's default image viewer
pub mod viewer;

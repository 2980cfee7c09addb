//! Command verbs and numeric reply codes used by ircforge.
//!
//! Only the codes the client actually reacts to are named here; anything
//! else still parses and is simply ignored by the dispatch table.

/// Alphabetic commands.
pub mod command {
    pub const PASS: &str = "PASS";
    pub const NICK: &str = "NICK";
    pub const USER: &str = "USER";
    pub const PING: &str = "PING";
    pub const PONG: &str = "PONG";
    pub const QUIT: &str = "QUIT";
    pub const ERROR: &str = "ERROR";
    pub const JOIN: &str = "JOIN";
    pub const PART: &str = "PART";
    pub const KICK: &str = "KICK";
    pub const MODE: &str = "MODE";
    pub const TOPIC: &str = "TOPIC";
    pub const NAMES: &str = "NAMES";
    pub const INVITE: &str = "INVITE";
    pub const WHOIS: &str = "WHOIS";
    pub const PRIVMSG: &str = "PRIVMSG";
    pub const NOTICE: &str = "NOTICE";
}

pub const RPL_WELCOME: &str = "001";
pub const RPL_ISUPPORT: &str = "005";

pub const RPL_AWAY: &str = "301";
pub const RPL_WHOISREGNICK: &str = "307";
pub const RPL_WHOISUSER: &str = "311";
pub const RPL_WHOISSERVER: &str = "312";
pub const RPL_WHOISOPERATOR: &str = "313";
pub const RPL_WHOISIDLE: &str = "317";
pub const RPL_ENDOFWHOIS: &str = "318";
pub const RPL_WHOISCHANNELS: &str = "319";
pub const RPL_WHOISSPECIAL: &str = "320";
pub const RPL_WHOISACCOUNT: &str = "330";
pub const RPL_NOTOPIC: &str = "331";
pub const RPL_TOPIC: &str = "332";
/// Topic author and timestamp. Nonstandard, so it may never arrive.
pub const RPL_TOPICWHOTIME: &str = "333";
pub const RPL_WHOISACTUALLY: &str = "338";
pub const RPL_NAMREPLY: &str = "353";
pub const RPL_ENDOFNAMES: &str = "366";
pub const RPL_WHOISHOST: &str = "378";
pub const RPL_WHOISSECURE: &str = "671";

pub const ERR_NOSUCHNICK: &str = "401";
pub const ERR_NOSUCHSERVER: &str = "402";
pub const ERR_NOSUCHCHANNEL: &str = "403";
pub const ERR_TOOMANYCHANNELS: &str = "405";
pub const ERR_NONICKNAMEGIVEN: &str = "431";
pub const ERR_ERRONEUSNICKNAME: &str = "432";
pub const ERR_NICKNAMEINUSE: &str = "433";
pub const ERR_NICKCOLLISION: &str = "436";
pub const ERR_PASSWDMISMATCH: &str = "464";
pub const ERR_YOUREBANNEDCREEP: &str = "465";
pub const ERR_CHANNELISFULL: &str = "471";
pub const ERR_INVITEONLYCHAN: &str = "473";
pub const ERR_BANNEDFROMCHAN: &str = "474";
pub const ERR_BADCHANNELKEY: &str = "475";
pub const ERR_BADCHANMASK: &str = "476";
pub const ERR_NEEDREGGEDNICK: &str = "477";

/// Replies that refuse a JOIN. The channel name is always the second
/// argument (after our own nick).
pub const JOIN_ERRORS: &[&str] = &[
    ERR_NOSUCHCHANNEL,
    ERR_TOOMANYCHANNELS,
    ERR_CHANNELISFULL,
    ERR_INVITEONLYCHAN,
    ERR_BANNEDFROMCHAN,
    ERR_BADCHANNELKEY,
    ERR_BADCHANMASK,
    ERR_NEEDREGGEDNICK,
];

/// Replies that refuse a nickname during registration.
pub const NICK_ERRORS: &[&str] = &[ERR_ERRONEUSNICKNAME, ERR_NICKNAMEINUSE, ERR_NICKCOLLISION];
